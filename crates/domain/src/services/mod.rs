//! Domain services.

pub mod audit;

pub use audit::AuditLogBuilder;
