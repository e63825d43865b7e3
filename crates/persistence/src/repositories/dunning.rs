//! Dunning sequence repository. Steps are stored in their own table and
//! always loaded together with the sequence.

use domain::models::dunning::join_channels;
use domain::models::{DunningSequence, DunningStatus, DunningStep};
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::{DunningSequenceEntity, DunningStepEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct DunningRepository {
    pool: PgPool,
}

impl DunningRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persists a freshly opened sequence with its steps in one transaction.
    pub async fn create(&self, sequence: &DunningSequence) -> Result<DunningSequence, sqlx::Error> {
        let timer = QueryTimer::new("create_dunning_sequence");
        let mut tx = self.pool.begin().await?;

        let entity = sqlx::query_as::<_, DunningSequenceEntity>(
            r#"
            INSERT INTO dunning_sequences (
                id, tenant_id, invoice_id, member_id, subscription_id, amount, currency, status,
                failed_at, failure_reason, retry_count, max_retries, next_retry_date,
                suspension_day, deactivation_day
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(sequence.id)
        .bind(sequence.tenant_id)
        .bind(sequence.invoice_id)
        .bind(sequence.member_id)
        .bind(sequence.subscription_id)
        .bind(sequence.amount)
        .bind(&sequence.currency)
        .bind(sequence.status.as_str())
        .bind(sequence.failed_at)
        .bind(&sequence.failure_reason)
        .bind(sequence.retry_count)
        .bind(sequence.max_retries)
        .bind(sequence.next_retry_date)
        .bind(sequence.suspension_day)
        .bind(sequence.deactivation_day)
        .fetch_one(&mut *tx)
        .await?;

        let mut steps = Vec::with_capacity(sequence.steps.len());
        for step in &sequence.steps {
            steps.push(Self::insert_step(&mut tx, entity.id, step).await?);
        }
        tx.commit().await?;
        timer.record();

        Ok(entity.into_domain(steps))
    }

    async fn insert_step(
        conn: &mut PgConnection,
        sequence_id: Uuid,
        step: &DunningStep,
    ) -> Result<DunningStep, sqlx::Error> {
        let entity = sqlx::query_as::<_, DunningStepEntity>(
            r#"
            INSERT INTO dunning_steps (
                id, sequence_id, day_after_failure, channels, description, template,
                include_payment_link, escalate_to_csm, is_sent, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(step.id)
        .bind(sequence_id)
        .bind(step.day_after_failure)
        .bind(join_channels(&step.channels))
        .bind(&step.description)
        .bind(&step.template)
        .bind(step.include_payment_link)
        .bind(step.escalate_to_csm)
        .bind(step.is_sent)
        .bind(step.sent_at)
        .fetch_one(conn)
        .await?;
        Ok(entity.into())
    }

    async fn load_steps(&self, sequence_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<DunningStep>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, DunningStepEntity>(
            "SELECT * FROM dunning_steps WHERE sequence_id = ANY($1) ORDER BY day_after_failure",
        )
        .bind(sequence_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut steps: HashMap<Uuid, Vec<DunningStep>> = HashMap::new();
        for row in rows {
            steps.entry(row.sequence_id).or_default().push(row.into());
        }
        Ok(steps)
    }

    async fn with_steps(
        &self,
        entities: Vec<DunningSequenceEntity>,
    ) -> Result<Vec<DunningSequence>, sqlx::Error> {
        let ids: Vec<Uuid> = entities.iter().map(|e| e.id).collect();
        let mut steps = self.load_steps(&ids).await?;
        Ok(entities
            .into_iter()
            .map(|e| {
                let own = steps.remove(&e.id).unwrap_or_default();
                e.into_domain(own)
            })
            .collect())
    }

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DunningSequence>, sqlx::Error> {
        let timer = QueryTimer::new("find_dunning_sequence_by_id");
        let entity = sqlx::query_as::<_, DunningSequenceEntity>(
            "SELECT * FROM dunning_sequences WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        let result = match entity {
            Some(e) => self.with_steps(vec![e]).await?.pop(),
            None => None,
        };
        timer.record();
        Ok(result)
    }

    pub async fn find_open_for_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<DunningSequence>, sqlx::Error> {
        let timer = QueryTimer::new("find_open_dunning_for_invoice");
        let entity = sqlx::query_as::<_, DunningSequenceEntity>(
            r#"
            SELECT * FROM dunning_sequences
            WHERE tenant_id = $1 AND invoice_id = $2 AND status IN ('ACTIVE', 'SUSPENDED')
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;
        let result = match entity {
            Some(e) => self.with_steps(vec![e]).await?.pop(),
            None => None,
        };
        timer.record();
        Ok(result)
    }

    /// Whether the invoice already has an ACTIVE or SUSPENDED sequence.
    pub async fn has_open_for_invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("has_open_dunning_for_invoice");
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM dunning_sequences
                WHERE tenant_id = $1 AND invoice_id = $2 AND status IN ('ACTIVE', 'SUSPENDED')
            )
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(exists)
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        status: Option<DunningStatus>,
        page: &PageRequest,
    ) -> Result<(Vec<DunningSequence>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_dunning_sequences");
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM dunning_sequences WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(tenant_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, DunningSequenceEntity>(
            r#"
            SELECT * FROM dunning_sequences
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY failed_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let sequences = self.with_steps(rows).await?;
        timer.record();
        Ok((sequences, total))
    }

    /// ACTIVE and SUSPENDED sequences of every tenant, oldest failure first.
    pub async fn list_open(&self, limit: i64) -> Result<Vec<DunningSequence>, sqlx::Error> {
        let timer = QueryTimer::new("list_open_dunning_sequences");
        let rows = sqlx::query_as::<_, DunningSequenceEntity>(
            r#"
            SELECT * FROM dunning_sequences
            WHERE status IN ('ACTIVE', 'SUSPENDED')
            ORDER BY failed_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let sequences = self.with_steps(rows).await?;
        timer.record();
        Ok(sequences)
    }

    /// Writes back the sequence and the sent flags of its steps.
    pub async fn update(&self, sequence: &DunningSequence) -> Result<DunningSequence, sqlx::Error> {
        let timer = QueryTimer::new("update_dunning_sequence");
        let mut tx = self.pool.begin().await?;

        let entity = sqlx::query_as::<_, DunningSequenceEntity>(
            r#"
            UPDATE dunning_sequences
            SET status = $3, retry_count = $4, next_retry_date = $5, last_retry_at = $6,
                last_retry_result = $7, suspended_at = $8, deactivated_at = $9, recovered_at = $10,
                recovery_method = $11, escalated_to_csm = $12, escalated_at = $13, csm_id = $14,
                notes = $15, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(sequence.id)
        .bind(sequence.tenant_id)
        .bind(sequence.status.as_str())
        .bind(sequence.retry_count)
        .bind(sequence.next_retry_date)
        .bind(sequence.last_retry_at)
        .bind(&sequence.last_retry_result)
        .bind(sequence.suspended_at)
        .bind(sequence.deactivated_at)
        .bind(sequence.recovered_at)
        .bind(&sequence.recovery_method)
        .bind(sequence.escalated_to_csm)
        .bind(sequence.escalated_at)
        .bind(sequence.csm_id)
        .bind(&sequence.notes)
        .fetch_one(&mut *tx)
        .await?;

        for step in &sequence.steps {
            sqlx::query("UPDATE dunning_steps SET is_sent = $2, sent_at = $3 WHERE id = $1")
                .bind(step.id)
                .bind(step.is_sent)
                .bind(step.sent_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        timer.record();

        Ok(entity.into_domain(sequence.steps.clone()))
    }
}
