//! Multi-step flows shared by several handlers and jobs.

pub mod attendance;
pub mod auth;
pub mod billing;
pub mod booking;
pub mod sync;

pub use attendance::AttendanceService;
pub use auth::{build_jwt_config, AuthError, AuthService};
pub use billing::{BillingService, DunningAdvance};
pub use booking::BookingService;
pub use sync::SyncService;
