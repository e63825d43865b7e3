//! Flags issued invoices past their due date as OVERDUE.

use chrono::Utc;
use persistence::repositories::InvoiceRepository;
use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

pub struct OverdueInvoicesJob {
    pool: PgPool,
    interval_secs: u64,
}

impl OverdueInvoicesJob {
    pub fn new(pool: PgPool, interval_secs: u64) -> Self {
        Self {
            pool,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for OverdueInvoicesJob {
    fn name(&self) -> &'static str {
        "overdue_invoices"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let today = Utc::now().date_naive();
        let invoices = InvoiceRepository::new(self.pool.clone())
            .mark_overdue(today)
            .await
            .map_err(|e| format!("Failed to mark invoices overdue: {}", e))?;

        metrics::counter!("invoices_marked_overdue_total").increment(invoices.len() as u64);
        for invoice in &invoices {
            info!(
                tenant_id = %invoice.tenant_id,
                invoice_id = %invoice.id,
                number = %invoice.invoice_number,
                "Invoice is overdue"
            );
        }
        Ok(())
    }
}
