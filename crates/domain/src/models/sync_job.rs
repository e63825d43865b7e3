//! Single-row sync job used by the equipment and wearable integrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum SyncJobStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

db_enum! {
    /// Which integration a job belongs to; `target_id` points at the
    /// provider config or the wearable connection.
    pub enum SyncSource {
        Equipment => "EQUIPMENT",
        Wearable => "WEARABLE",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub source: SyncSource,
    pub target_id: Uuid,
    pub status: SyncJobStatus,
    pub records_processed: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn new(tenant_id: Uuid, source: SyncSource, target_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            source,
            target_id,
            status: SyncJobStatus::Pending,
            records_processed: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, SyncJobStatus::Completed | SyncJobStatus::Failed)
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == SyncJobStatus::Pending,
            format!("Cannot start sync job in status {}", self.status),
        )?;
        self.status = SyncJobStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, records: i32, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == SyncJobStatus::Running,
            format!("Cannot complete sync job in status {}", self.status),
        )?;
        ensure_argument(records >= 0, "Records processed must not be negative")?;
        self.status = SyncJobStatus::Completed;
        self.records_processed = records;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            !self.is_finished(),
            format!("Cannot fail sync job in status {}", self.status),
        )?;
        self.status = SyncJobStatus::Failed;
        self.error_message = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSyncJobRequest {
    #[validate(range(min = 0, message = "Records processed must not be negative"))]
    pub records_processed: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FailSyncJobRequest {
    #[validate(length(min = 1, max = 2000, message = "Error message must be 1-2000 characters"))]
    pub error_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job() -> SyncJob {
        SyncJob::new(Uuid::new_v4(), SyncSource::Equipment, Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_happy_path() {
        let mut j = job();
        let t0 = Utc::now();
        j.start(t0).unwrap();
        j.complete(42, t0 + Duration::seconds(90)).unwrap();
        assert_eq!(j.status, SyncJobStatus::Completed);
        assert_eq!(j.records_processed, 42);
        assert_eq!(j.duration_seconds(), Some(90));
    }

    #[test]
    fn test_cannot_complete_without_start() {
        let mut j = job();
        assert!(j.complete(1, Utc::now()).is_err());
    }

    #[test]
    fn test_fail_from_pending_or_running() {
        let mut j = job();
        j.fail("token expired".into(), Utc::now()).unwrap();
        assert_eq!(j.status, SyncJobStatus::Failed);
        assert!(j.start(Utc::now()).is_err());

        let mut running = job();
        running.start(Utc::now()).unwrap();
        running.fail("timeout".into(), Utc::now()).unwrap();
        assert!(running.fail("again".into(), Utc::now()).is_err());
    }
}
