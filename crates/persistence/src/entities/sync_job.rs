//! Sync job entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::sync_job::SyncSource;
use domain::models::{SyncJob, SyncJobStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the sync_jobs table.
#[derive(Debug, Clone, FromRow)]
pub struct SyncJobEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub source: String,
    pub target_id: Uuid,
    pub status: String,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SyncJobEntity> for SyncJob {
    fn from(entity: SyncJobEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            source: SyncSource::from_str(&entity.source).unwrap_or(SyncSource::Equipment),
            target_id: entity.target_id,
            status: SyncJobStatus::from_str(&entity.status).unwrap_or(SyncJobStatus::Failed),
            records_processed: entity.records_processed,
            error_message: entity.error_message,
            started_at: entity.started_at,
            completed_at: entity.completed_at,
            created_at: entity.created_at,
        }
    }
}
