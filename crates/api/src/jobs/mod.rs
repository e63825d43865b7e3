//! Background job scheduler and job implementations.

mod dunning;
mod kiosk_session_expiry;
mod overdue_invoices;
mod pool_metrics;
mod scheduler;
mod subscription_expiry;

pub use dunning::DunningJob;
pub use kiosk_session_expiry::KioskSessionExpiryJob;
pub use overdue_invoices::OverdueInvoicesJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use subscription_expiry::SubscriptionExpiryJob;
