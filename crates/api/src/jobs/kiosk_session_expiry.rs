//! Expires kiosk sessions left idle.

use chrono::{Duration, Utc};
use domain::models::kiosk::SESSION_IDLE_TIMEOUT_MINUTES;
use persistence::repositories::KioskRepository;
use sqlx::PgPool;
use tracing::debug;

use super::scheduler::{Job, JobFrequency};

pub struct KioskSessionExpiryJob {
    pool: PgPool,
    interval_secs: u64,
}

impl KioskSessionExpiryJob {
    pub fn new(pool: PgPool, interval_secs: u64) -> Self {
        Self {
            pool,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for KioskSessionExpiryJob {
    fn name(&self) -> &'static str {
        "kiosk_session_expiry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let cutoff = Utc::now() - Duration::minutes(SESSION_IDLE_TIMEOUT_MINUTES);
        let expired = KioskRepository::new(self.pool.clone())
            .expire_idle_sessions(cutoff)
            .await
            .map_err(|e| format!("Failed to expire kiosk sessions: {}", e))?;
        if expired > 0 {
            debug!(expired, "Expired idle kiosk sessions");
        }
        Ok(())
    }
}
