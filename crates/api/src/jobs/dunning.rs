//! Sends due dunning reminders and escalates unpaid sequences.

use chrono::Utc;
use persistence::repositories::DunningRepository;
use sqlx::PgPool;
use tracing::{info, warn};

use super::scheduler::{Job, JobFrequency};
use crate::config::BillingConfig;
use crate::services::BillingService;

pub struct DunningJob {
    pool: PgPool,
    billing: BillingConfig,
    interval_secs: u64,
    batch_size: i64,
}

impl DunningJob {
    pub fn new(pool: PgPool, billing: BillingConfig, interval_secs: u64, batch_size: i64) -> Self {
        Self {
            pool,
            billing,
            interval_secs,
            batch_size,
        }
    }
}

#[async_trait::async_trait]
impl Job for DunningJob {
    fn name(&self) -> &'static str {
        "dunning"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let now = Utc::now();
        let sequences = DunningRepository::new(self.pool.clone())
            .list_open(self.batch_size)
            .await
            .map_err(|e| format!("Failed to load open dunning sequences: {}", e))?;

        let service = BillingService::new(self.pool.clone(), self.billing.clone());
        let (mut steps, mut suspended, mut deactivated, mut failed) = (0usize, 0usize, 0usize, 0usize);
        for sequence in sequences {
            let sequence_id = sequence.id;
            let tenant_id = sequence.tenant_id;
            match service.advance_dunning(sequence, now).await {
                Ok(advance) => {
                    steps += advance.steps_sent;
                    suspended += usize::from(advance.suspended);
                    deactivated += usize::from(advance.deactivated);
                }
                Err(e) => {
                    failed += 1;
                    warn!(tenant_id = %tenant_id, sequence_id = %sequence_id, error = %e, "Dunning advance failed");
                }
            }
        }

        metrics::counter!("dunning_steps_sent_total").increment(steps as u64);
        if steps > 0 || suspended > 0 || deactivated > 0 {
            info!(steps, suspended, deactivated, "Dunning pass finished");
        }
        if failed > 0 {
            return Err(format!("{} dunning sequence(s) could not be advanced", failed));
        }
        Ok(())
    }
}
