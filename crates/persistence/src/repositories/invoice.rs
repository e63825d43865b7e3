//! Invoice repository.

use chrono::NaiveDate;
use domain::models::invoice::{InvoiceCounts, InvoiceQuery, InvoiceTotals};
use domain::models::{Invoice, InvoiceLineItem, InvoiceStatus};
use shared::pagination::PageRequest;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::{InvoiceEntity, StatusCountEntity};
use crate::metrics::QueryTimer;

/// Values for a new DRAFT invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub member_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub line_items: Vec<InvoiceLineItem>,
    pub totals: InvoiceTotals,
    pub vat_rate_bps: i32,
    pub currency: String,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        tenant_id: Uuid,
        new: &NewInvoice,
    ) -> Result<Invoice, sqlx::Error> {
        let timer = QueryTimer::new("insert_invoice");
        let result = sqlx::query_as::<_, InvoiceEntity>(
            r#"
            INSERT INTO invoices (
                tenant_id, invoice_number, member_id, subscription_id, line_items, subtotal,
                vat_rate_bps, tax_amount, total, currency, due_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&new.invoice_number)
        .bind(new.member_id)
        .bind(new.subscription_id)
        .bind(Json(&new.line_items))
        .bind(new.totals.subtotal)
        .bind(new.vat_rate_bps)
        .bind(new.totals.tax_amount)
        .bind(new.totals.total)
        .bind(&new.currency)
        .bind(new.due_date)
        .bind(&new.notes)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Invoice>, sqlx::Error> {
        let timer = QueryTimer::new("find_invoice_by_id");
        let result = sqlx::query_as::<_, InvoiceEntity>(
            "SELECT * FROM invoices WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        query: &InvoiceQuery,
        page: &PageRequest,
    ) -> Result<(Vec<Invoice>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_invoices");
        let status = query.status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invoices
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2) AND ($3::uuid IS NULL OR member_id = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.member_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, InvoiceEntity>(
            r#"
            SELECT * FROM invoices
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2) AND ($3::uuid IS NULL OR member_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.member_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, invoice: &Invoice) -> Result<Invoice, sqlx::Error> {
        let timer = QueryTimer::new("update_invoice");
        let result = sqlx::query_as::<_, InvoiceEntity>(
            r#"
            UPDATE invoices
            SET status = $3, paid_amount = $4, issue_date = $5, paid_at = $6, payment_method = $7,
                payment_reference = $8, notes = $9, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.tenant_id)
        .bind(invoice.status.as_str())
        .bind(invoice.paid_amount)
        .bind(invoice.issue_date)
        .bind(invoice.paid_at)
        .bind(&invoice.payment_method)
        .bind(&invoice.payment_reference)
        .bind(&invoice.notes)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_invoice");
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_status(&self, tenant_id: Uuid) -> Result<InvoiceCounts, sqlx::Error> {
        let timer = QueryTimer::new("count_invoices_by_status");
        let rows = sqlx::query_as::<_, StatusCountEntity>(
            "SELECT status, COUNT(*) AS count FROM invoices WHERE tenant_id = $1 GROUP BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        let mut counts = InvoiceCounts::default();
        for row in rows {
            let slot = match InvoiceStatus::from_str(&row.status) {
                Ok(InvoiceStatus::Draft) => &mut counts.draft,
                Ok(InvoiceStatus::Issued) => &mut counts.issued,
                Ok(InvoiceStatus::Paid) => &mut counts.paid,
                Ok(InvoiceStatus::PartiallyPaid) => &mut counts.partially_paid,
                Ok(InvoiceStatus::Overdue) => &mut counts.overdue,
                Ok(InvoiceStatus::Cancelled) => &mut counts.cancelled,
                Err(_) => continue,
            };
            *slot = row.count;
        }
        Ok(counts)
    }

    /// Flags ISSUED invoices of every tenant whose due date is before `today`.
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<Vec<Invoice>, sqlx::Error> {
        let timer = QueryTimer::new("mark_invoices_overdue");
        let rows = sqlx::query_as::<_, InvoiceEntity>(
            r#"
            UPDATE invoices
            SET status = 'OVERDUE', updated_at = NOW()
            WHERE status = 'ISSUED' AND due_date < $1
            RETURNING *
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
