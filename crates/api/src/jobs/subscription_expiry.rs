//! Expires lapsed subscriptions and completes due cancellations.

use chrono::Utc;
use persistence::repositories::SubscriptionRepository;
use sqlx::PgPool;
use tracing::{info, warn};

use super::scheduler::{Job, JobFrequency};

pub struct SubscriptionExpiryJob {
    pool: PgPool,
    interval_secs: u64,
    batch_size: i64,
}

impl SubscriptionExpiryJob {
    pub fn new(pool: PgPool, interval_secs: u64, batch_size: i64) -> Self {
        Self {
            pool,
            interval_secs,
            batch_size,
        }
    }
}

#[async_trait::async_trait]
impl Job for SubscriptionExpiryJob {
    fn name(&self) -> &'static str {
        "subscription_expiry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let now = Utc::now();
        let today = now.date_naive();
        let repo = SubscriptionRepository::new(self.pool.clone());

        let due = repo
            .find_due_for_expiry(today, self.batch_size)
            .await
            .map_err(|e| format!("Failed to load subscriptions due for expiry: {}", e))?;

        let mut expired = 0usize;
        let mut cancelled = 0usize;
        for mut subscription in due {
            let changed = if subscription.is_cancellation_due(today) {
                match subscription.complete_cancellation(now) {
                    Ok(()) => {
                        cancelled += 1;
                        true
                    }
                    Err(e) => {
                        warn!(subscription_id = %subscription.id, error = %e, "Could not complete cancellation");
                        false
                    }
                }
            } else if subscription.expire_if_due(today) {
                expired += 1;
                true
            } else {
                false
            };

            if changed {
                if let Err(e) = repo.update(&subscription).await {
                    warn!(
                        tenant_id = %subscription.tenant_id,
                        subscription_id = %subscription.id,
                        error = %e,
                        "Failed to persist subscription change"
                    );
                }
            }
        }

        metrics::counter!("subscriptions_expired_total").increment(expired as u64);
        metrics::counter!("subscriptions_cancelled_total").increment(cancelled as u64);
        if expired > 0 || cancelled > 0 {
            info!(
                expired,
                cancelled,
                "Subscription expiry pass finished"
            );
        }
        Ok(())
    }
}
