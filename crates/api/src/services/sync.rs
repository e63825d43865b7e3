//! Sync job lifecycle for equipment provider configs and wearable connections.
//!
//! A job is created and started in one call; finishing it also records the
//! outcome on the config or connection it belongs to.

use chrono::{DateTime, Utc};
use domain::models::sync_job::SyncSource;
use domain::models::SyncJob;
use persistence::repositories::{EquipmentRepository, SyncJobRepository, WearableRepository};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

enum Outcome {
    Completed(i32),
    Failed(String),
}

pub struct SyncService {
    pool: PgPool,
}

impl SyncService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_target(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        target_id: Uuid,
    ) -> Result<(), ApiError> {
        match source {
            SyncSource::Equipment => {
                let config = EquipmentRepository::new(self.pool.clone())
                    .find_config(tenant_id, target_id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("Provider config not found".to_string()))?;
                if !config.sync_enabled {
                    return Err(ApiError::Conflict(
                        "Sync is disabled for this provider config".to_string(),
                    ));
                }
            }
            SyncSource::Wearable => {
                WearableRepository::new(self.pool.clone())
                    .find_connection(tenant_id, target_id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("Wearable connection not found".to_string()))?
                    .ensure_syncable()?;
            }
        }
        Ok(())
    }

    /// Creates a job and moves it straight to RUNNING.
    pub async fn start(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        target_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SyncJob, ApiError> {
        self.ensure_target(tenant_id, source, target_id).await?;
        let mut job = SyncJob::new(tenant_id, source, target_id, now);
        job.start(now)?;
        let job = SyncJobRepository::new(self.pool.clone()).create(&job).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            job_id = %job.id,
            source = %source,
            target_id = %target_id,
            "Sync job started"
        );
        Ok(job)
    }

    pub async fn complete(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        job_id: Uuid,
        records: i32,
        now: DateTime<Utc>,
    ) -> Result<SyncJob, ApiError> {
        self.finish(tenant_id, source, job_id, Outcome::Completed(records), now)
            .await
    }

    pub async fn fail(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        job_id: Uuid,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<SyncJob, ApiError> {
        self.finish(tenant_id, source, job_id, Outcome::Failed(error), now)
            .await
    }

    async fn finish(
        &self,
        tenant_id: Uuid,
        source: SyncSource,
        job_id: Uuid,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<SyncJob, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut job = SyncJobRepository::lock_by_id(&mut tx, tenant_id, source, job_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Sync job not found".to_string()))?;

        let error = match outcome {
            Outcome::Completed(records) => {
                job.complete(records, now)?;
                None
            }
            Outcome::Failed(error) => {
                job.fail(error.clone(), now)?;
                Some(error)
            }
        };

        let job = SyncJobRepository::save(&mut *tx, &job).await?;
        match source {
            SyncSource::Equipment => {
                let configs = EquipmentRepository::new(self.pool.clone());
                if let Some(mut config) = configs.find_config(tenant_id, job.target_id).await? {
                    match error.clone() {
                        None => config.mark_synced(now),
                        Some(e) => config.record_error(e),
                    }
                    EquipmentRepository::save_config(&mut *tx, &config).await?;
                }
            }
            SyncSource::Wearable => {
                let connections = WearableRepository::new(self.pool.clone());
                if let Some(mut connection) =
                    connections.find_connection(tenant_id, job.target_id).await?
                {
                    connection.record_sync_result(error.clone(), now);
                    WearableRepository::save_connection(&mut *tx, &connection).await?;
                }
            }
        }
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            job_id = %job.id,
            status = %job.status,
            records = job.records_processed,
            "Sync job finished"
        );
        Ok(job)
    }
}
