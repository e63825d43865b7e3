//! E-invoice (ZATCA) submission repository.

use domain::models::zatca::ZatcaQuery;
use domain::models::ZatcaSubmission;
use serde_json::Value;
use shared::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ZatcaSubmissionEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct ZatcaRepository {
    pool: PgPool,
}

impl ZatcaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        invoice_number: &str,
        invoice_hash: &str,
        payload: &Value,
    ) -> Result<ZatcaSubmission, sqlx::Error> {
        let timer = QueryTimer::new("create_zatca_submission");
        let result = sqlx::query_as::<_, ZatcaSubmissionEntity>(
            r#"
            INSERT INTO zatca_submissions (tenant_id, invoice_id, invoice_number, invoice_hash, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(invoice_number)
        .bind(invoice_hash)
        .bind(payload)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ZatcaSubmission>, sqlx::Error> {
        let timer = QueryTimer::new("find_zatca_submission");
        let result = sqlx::query_as::<_, ZatcaSubmissionEntity>(
            "SELECT * FROM zatca_submissions WHERE id = $1 AND tenant_id = $2",
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
        query: &ZatcaQuery,
        page: &PageRequest,
    ) -> Result<(Vec<ZatcaSubmission>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_zatca_submissions");
        let status = query.status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM zatca_submissions
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2) AND ($3::uuid IS NULL OR invoice_id = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.invoice_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ZatcaSubmissionEntity>(
            r#"
            SELECT * FROM zatca_submissions
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2) AND ($3::uuid IS NULL OR invoice_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.invoice_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, submission: &ZatcaSubmission) -> Result<ZatcaSubmission, sqlx::Error> {
        let timer = QueryTimer::new("update_zatca_submission");
        let result = sqlx::query_as::<_, ZatcaSubmissionEntity>(
            r#"
            UPDATE zatca_submissions
            SET invoice_hash = $3, payload = $4, status = $5, attempts = $6, submitted_at = $7,
                responded_at = $8, clearance_id = $9, rejection_reason = $10, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(submission.id)
        .bind(submission.tenant_id)
        .bind(&submission.invoice_hash)
        .bind(&submission.payload)
        .bind(submission.status.as_str())
        .bind(submission.attempts)
        .bind(submission.submitted_at)
        .bind(submission.responded_at)
        .bind(&submission.clearance_id)
        .bind(&submission.rejection_reason)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }
}
