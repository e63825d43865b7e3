//! Invoice creation and dunning start.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use domain::models::dunning::{join_channels, DunningSequence};
use domain::models::invoice::{
    CreateInvoiceRequest, CreateSubscriptionInvoiceRequest, InvoiceLineItem, InvoiceTotals,
};
use domain::models::{Invoice, Subscription};
use domain::DomainError;
use persistence::repositories::{
    next_number, DunningRepository, InvoiceRepository, MemberRepository,
    MembershipPlanRepository, NewInvoice, NumberSeries, SubscriptionRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::error::ApiError;

/// What one pass over a dunning sequence changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DunningAdvance {
    pub steps_sent: usize,
    pub suspended: bool,
    pub deactivated: bool,
}

impl DunningAdvance {
    pub fn changed(&self) -> bool {
        self.steps_sent > 0 || self.suspended || self.deactivated
    }
}

pub struct BillingService {
    pool: PgPool,
    config: BillingConfig,
}

impl BillingService {
    pub fn new(pool: PgPool, config: BillingConfig) -> Self {
        Self { pool, config }
    }

    fn default_due_date(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.config.payment_terms_days)
    }

    /// Creates a DRAFT invoice numbered `INV-{year}-{seq}` within the tenant.
    pub async fn create_invoice(
        &self,
        tenant_id: Uuid,
        request: &CreateInvoiceRequest,
        today: NaiveDate,
    ) -> Result<Invoice, ApiError> {
        MemberRepository::new(self.pool.clone())
            .find_by_id(tenant_id, request.member_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
        if let Some(subscription_id) = request.subscription_id {
            SubscriptionRepository::new(self.pool.clone())
                .find_by_id(tenant_id, subscription_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Subscription not found".to_string()))?;
        }

        let vat_rate_bps = request.vat_rate_bps.unwrap_or(self.config.default_vat_rate_bps);
        let totals = InvoiceTotals::compute(&request.line_items, vat_rate_bps)?;
        let due_date = request.due_date.unwrap_or_else(|| self.default_due_date(today));
        if due_date < today {
            return Err(ApiError::Validation(
                "Due date must not be in the past".to_string(),
            ));
        }

        self.insert_numbered(
            tenant_id,
            today,
            NewInvoice {
                invoice_number: String::new(),
                member_id: request.member_id,
                subscription_id: request.subscription_id,
                line_items: request.line_items.clone(),
                totals,
                vat_rate_bps,
                currency: request
                    .currency
                    .as_deref()
                    .unwrap_or(&self.config.currency)
                    .to_uppercase(),
                due_date,
                notes: request.notes.clone(),
            },
        )
        .await
    }

    /// Bills a subscription's price as a single line item.
    pub async fn invoice_subscription(
        &self,
        tenant_id: Uuid,
        request: &CreateSubscriptionInvoiceRequest,
        today: NaiveDate,
    ) -> Result<Invoice, ApiError> {
        let subscription = SubscriptionRepository::new(self.pool.clone())
            .find_by_id(tenant_id, request.subscription_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Subscription not found".to_string()))?;
        let plan = MembershipPlanRepository::new(self.pool.clone())
            .find_by_id(tenant_id, subscription.plan_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Membership plan not found".to_string()))?;

        let line_items = vec![InvoiceLineItem {
            description: format!(
                "{} ({} to {})",
                plan.name, subscription.start_date, subscription.end_date
            ),
            quantity: 1,
            unit_price: subscription.price,
        }];
        let vat_rate_bps = self.config.default_vat_rate_bps;
        let totals = InvoiceTotals::compute(&line_items, vat_rate_bps)?;

        self.insert_numbered(
            tenant_id,
            today,
            NewInvoice {
                invoice_number: String::new(),
                member_id: subscription.member_id,
                subscription_id: Some(subscription.id),
                line_items,
                totals,
                vat_rate_bps,
                currency: plan.currency,
                due_date: request.due_date.unwrap_or_else(|| self.default_due_date(today)),
                notes: None,
            },
        )
        .await
    }

    async fn insert_numbered(
        &self,
        tenant_id: Uuid,
        today: NaiveDate,
        mut new: NewInvoice,
    ) -> Result<Invoice, ApiError> {
        let mut tx = self.pool.begin().await?;
        new.invoice_number =
            next_number(&mut *tx, NumberSeries::Invoice(tenant_id), today.year()).await?;
        let invoice = InvoiceRepository::insert(&mut *tx, tenant_id, &new).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total = invoice.total,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Opens a dunning sequence for the unpaid balance of an invoice.
    pub async fn start_dunning(
        &self,
        invoice: &Invoice,
        failure_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DunningSequence, ApiError> {
        if !invoice.status.is_unpaid() {
            return Err(ApiError::Conflict(format!(
                "Cannot start dunning for invoice in status {}",
                invoice.status
            )));
        }
        let repo = DunningRepository::new(self.pool.clone());
        if repo.has_open_for_invoice(invoice.tenant_id, invoice.id).await? {
            return Err(ApiError::Conflict(
                "Invoice already has an open dunning sequence".to_string(),
            ));
        }

        let sequence = DunningSequence::open(
            invoice.tenant_id,
            invoice.id,
            invoice.member_id,
            invoice.subscription_id,
            invoice.balance_due(),
            invoice.currency.clone(),
            failure_reason,
            now,
        );
        let sequence = repo.create(&sequence).await?;

        tracing::info!(
            tenant_id = %invoice.tenant_id,
            invoice_id = %invoice.id,
            sequence_id = %sequence.id,
            amount = sequence.amount,
            "Dunning sequence started"
        );

        Ok(sequence)
    }

    /// Applies a change to the subscription the sequence is chasing, if any.
    /// A subscription already past the change (cancelled, expired) is left alone.
    async fn touch_subscription<F>(
        &self,
        sequence: &DunningSequence,
        change: F,
    ) -> Result<(), ApiError>
    where
        F: FnOnce(&mut Subscription) -> Result<(), DomainError>,
    {
        let Some(subscription_id) = sequence.subscription_id else {
            return Ok(());
        };
        let repo = SubscriptionRepository::new(self.pool.clone());
        let Some(mut subscription) = repo.find_by_id(sequence.tenant_id, subscription_id).await?
        else {
            return Ok(());
        };
        match change(&mut subscription) {
            Ok(()) => {
                repo.update(&subscription).await?;
            }
            Err(e) => tracing::debug!(
                subscription_id = %subscription_id,
                error = %e,
                "Subscription left unchanged by dunning"
            ),
        }
        Ok(())
    }

    pub async fn suspend_dunning(
        &self,
        mut sequence: DunningSequence,
        now: DateTime<Utc>,
    ) -> Result<DunningSequence, ApiError> {
        sequence.suspend(now)?;
        self.touch_subscription(&sequence, |s| s.suspend(now)).await?;
        Ok(DunningRepository::new(self.pool.clone()).update(&sequence).await?)
    }

    pub async fn deactivate_dunning(
        &self,
        mut sequence: DunningSequence,
        now: DateTime<Utc>,
    ) -> Result<DunningSequence, ApiError> {
        sequence.deactivate(now)?;
        self.touch_subscription(&sequence, |s| s.cancel(now)).await?;
        Ok(DunningRepository::new(self.pool.clone()).update(&sequence).await?)
    }

    /// Records a retry. A successful one recovers the sequence and lifts the suspension.
    pub async fn retry_dunning(
        &self,
        mut sequence: DunningSequence,
        success: bool,
        result: String,
        now: DateTime<Utc>,
    ) -> Result<DunningSequence, ApiError> {
        sequence.record_retry(success, result, now)?;
        if success {
            self.touch_subscription(&sequence, Subscription::reactivate).await?;
        }
        Ok(DunningRepository::new(self.pool.clone()).update(&sequence).await?)
    }

    /// Closes the open sequence of a fully paid invoice.
    pub async fn recover_for_invoice(
        &self,
        invoice: &Invoice,
        now: DateTime<Utc>,
    ) -> Result<Option<DunningSequence>, ApiError> {
        let repo = DunningRepository::new(self.pool.clone());
        let Some(mut sequence) = repo
            .find_open_for_invoice(invoice.tenant_id, invoice.id)
            .await?
        else {
            return Ok(None);
        };
        sequence.recover("payment", now);
        self.touch_subscription(&sequence, Subscription::reactivate).await?;
        let sequence = repo.update(&sequence).await?;

        tracing::info!(
            tenant_id = %invoice.tenant_id,
            invoice_id = %invoice.id,
            sequence_id = %sequence.id,
            "Dunning sequence recovered by payment"
        );
        Ok(Some(sequence))
    }

    /// Sends every step that has come due, then suspends or deactivates when
    /// the sequence has run long enough.
    pub async fn advance_dunning(
        &self,
        mut sequence: DunningSequence,
        now: DateTime<Utc>,
    ) -> Result<DunningAdvance, ApiError> {
        let mut advance = DunningAdvance::default();

        while let Some(step) = sequence.next_pending_step(now) {
            let step_id = step.id;
            tracing::info!(
                tenant_id = %sequence.tenant_id,
                sequence_id = %sequence.id,
                template = %step.template,
                channels = %join_channels(&step.channels),
                "Dunning notification due"
            );
            sequence.mark_step_sent(step_id, now)?;
            advance.steps_sent += 1;
        }

        if sequence.is_suspension_due(now) {
            sequence.suspend(now)?;
            self.touch_subscription(&sequence, |s| s.suspend(now)).await?;
            advance.suspended = true;
        }
        if sequence.is_deactivation_due(now) {
            sequence.deactivate(now)?;
            self.touch_subscription(&sequence, |s| s.cancel(now)).await?;
            advance.deactivated = true;
        }

        if advance.changed() {
            DunningRepository::new(self.pool.clone()).update(&sequence).await?;
        }
        Ok(advance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_advance_is_unchanged() {
        assert!(!DunningAdvance::default().changed());
        assert!(DunningAdvance {
            steps_sent: 1,
            ..Default::default()
        }
        .changed());
    }
}
