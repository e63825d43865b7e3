//! Custom Axum extractors.

pub mod pagination;
pub mod user_auth;

pub use pagination::Paging;
pub use user_auth::UserAuth;
