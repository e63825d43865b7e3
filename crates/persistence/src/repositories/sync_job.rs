//! Sync job repository shared by equipment provider configs and wearable connections.

use domain::models::sync_job::SyncSource;
use domain::models::SyncJob;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::SyncJobEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct SyncJobRepository {
    pool: PgPool,
}

impl SyncJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(&self, job: &SyncJob) -> Result<SyncJob, sqlx::Error> {
        let timer = QueryTimer::new("create_sync_job");
        let result = sqlx::query_as::<_, SyncJobEntity>(
            r#"
            INSERT INTO sync_jobs (id, tenant_id, source, target_id, status, records_processed, started_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(job.tenant_id)
        .bind(job.source.as_str())
        .bind(job.target_id)
        .bind(job.status.as_str())
        .bind(job.records_processed)
        .bind(job.started_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        id: Uuid,
    ) -> Result<Option<SyncJob>, sqlx::Error> {
        let timer = QueryTimer::new("find_sync_job_by_id");
        let result = sqlx::query_as::<_, SyncJobEntity>(
            "SELECT * FROM sync_jobs WHERE id = $1 AND tenant_id = $2 AND source = $3",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Reads a job inside the caller's transaction and holds its row lock until commit.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        source: SyncSource,
        id: Uuid,
    ) -> Result<Option<SyncJob>, sqlx::Error> {
        let timer = QueryTimer::new("lock_sync_job_by_id");
        let result = sqlx::query_as::<_, SyncJobEntity>(
            "SELECT * FROM sync_jobs WHERE id = $1 AND tenant_id = $2 AND source = $3 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(source.as_str())
        .fetch_optional(conn)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Jobs of one config/connection, newest first.
    pub async fn list_for_target(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        target_id: Uuid,
        limit: i64,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        let timer = QueryTimer::new("list_sync_jobs_for_target");
        let rows = sqlx::query_as::<_, SyncJobEntity>(
            r#"
            SELECT * FROM sync_jobs
            WHERE tenant_id = $1 AND source = $2 AND target_id = $3
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(tenant_id)
        .bind(source.as_str())
        .bind(target_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn latest_for_target(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        target_id: Uuid,
    ) -> Result<Option<SyncJob>, sqlx::Error> {
        Ok(self
            .list_for_target(tenant_id, source, target_id, 1)
            .await?
            .into_iter()
            .next())
    }

    pub async fn save<'e, E: PgExecutor<'e>>(executor: E, job: &SyncJob) -> Result<SyncJob, sqlx::Error> {
        let timer = QueryTimer::new("update_sync_job");
        let result = sqlx::query_as::<_, SyncJobEntity>(
            r#"
            UPDATE sync_jobs
            SET status = $3, records_processed = $4, error_message = $5, started_at = $6, completed_at = $7
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(job.tenant_id)
        .bind(job.status.as_str())
        .bind(job.records_processed)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn update(&self, job: &SyncJob) -> Result<SyncJob, sqlx::Error> {
        Self::save(&self.pool, job).await
    }
}
