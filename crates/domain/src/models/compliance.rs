//! Member data export requests and security events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum ExportRequestStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Processing => "PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

db_enum! {
    pub enum Severity {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

/// Download links of completed exports stay valid this long.
pub const EXPORT_DOWNLOAD_VALIDITY_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExportRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub requested_by: Uuid,
    pub status: ExportRequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataExportRequest {
    fn require(&self, expected: ExportRequestStatus, action: &str) -> Result<(), DomainError> {
        ensure_state(
            self.status == expected,
            format!("Cannot {} export request in status {}", action, self.status),
        )
    }

    pub fn approve(&mut self, reviewer: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(ExportRequestStatus::Pending, "approve")?;
        self.status = ExportRequestStatus::Approved;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        Ok(())
    }

    pub fn reject(
        &mut self,
        reviewer: Uuid,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.require(ExportRequestStatus::Pending, "reject")?;
        self.status = ExportRequestStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        self.rejection_reason = Some(reason);
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), DomainError> {
        self.require(ExportRequestStatus::Approved, "process")?;
        self.status = ExportRequestStatus::Processing;
        Ok(())
    }

    pub fn complete(&mut self, download_url: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(ExportRequestStatus::Processing, "complete")?;
        self.status = ExportRequestStatus::Completed;
        self.download_url = Some(download_url);
        self.download_expires_at = Some(now + Duration::days(EXPORT_DOWNLOAD_VALIDITY_DAYS));
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(ExportRequestStatus::Processing, "fail")?;
        self.status = ExportRequestStatus::Failed;
        self.error_message = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn is_download_available(&self, now: DateTime<Utc>) -> bool {
        self.status == ExportRequestStatus::Completed
            && self.download_expires_at.map_or(false, |exp| exp > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub id: Uuid,
    /// `None` for platform-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub event_type: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub description: String,
    pub details: Value,
    pub investigated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigated_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigation_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn mark_investigated(
        &mut self,
        by: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        ensure_state(!self.investigated, "Security event was already investigated")?;
        self.investigated = true;
        self.investigated_by = Some(by);
        self.investigated_at = Some(now);
        self.investigation_notes = notes;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportRequest {
    pub member_id: Uuid,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectExportRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteExportRequest {
    #[validate(url(message = "Download URL must be a valid URL"))]
    pub download_url: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FailExportRequest {
    #[validate(length(min = 1, max = 2000))]
    pub error_message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequestQuery {
    pub status: Option<ExportRequestStatus>,
    pub member_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordSecurityEventRequest {
    #[validate(length(min = 1, max = 100, message = "Event type must be 1-100 characters"))]
    pub event_type: String,
    pub severity: Severity,
    pub user_id: Option<Uuid>,
    #[validate(length(max = 45))]
    pub ip_address: Option<String>,
    #[validate(length(max = 500))]
    pub user_agent: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvestigateEventRequest {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEventQuery {
    pub event_type: Option<String>,
    pub severity: Option<Severity>,
    pub investigated: Option<bool>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
    pub uninvestigated: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export() -> DataExportRequest {
        DataExportRequest {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            status: ExportRequestStatus::Pending,
            reason: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            download_url: None,
            download_expires_at: None,
            error_message: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_export_happy_path() {
        let mut r = export();
        let now = Utc::now();
        r.approve(Uuid::new_v4(), now).unwrap();
        r.start_processing().unwrap();
        r.complete("https://files.example.com/export.zip".into(), now)
            .unwrap();
        assert_eq!(r.status, ExportRequestStatus::Completed);
        assert!(r.is_download_available(now));
        assert!(!r.is_download_available(now + Duration::days(8)));
    }

    #[test]
    fn test_export_rejection_is_final() {
        let mut r = export();
        r.reject(Uuid::new_v4(), "duplicate".into(), Utc::now())
            .unwrap();
        assert!(r.approve(Uuid::new_v4(), Utc::now()).is_err());
        assert!(r.start_processing().is_err());
    }

    #[test]
    fn test_export_cannot_skip_steps() {
        let mut r = export();
        assert!(r.start_processing().is_err());
        assert!(r.complete("https://x".into(), Utc::now()).is_err());
        r.approve(Uuid::new_v4(), Utc::now()).unwrap();
        assert!(r.fail("boom".into(), Utc::now()).is_err());
        r.start_processing().unwrap();
        r.fail("boom".into(), Utc::now()).unwrap();
        assert_eq!(r.status, ExportRequestStatus::Failed);
    }

    #[test]
    fn test_investigate_once() {
        let mut e = SecurityEvent {
            id: Uuid::new_v4(),
            tenant_id: None,
            event_type: "LOGIN_FAILED".into(),
            severity: Severity::Medium,
            user_id: None,
            ip_address: Some("10.0.0.1".into()),
            user_agent: None,
            description: "5 failed logins".into(),
            details: Value::Null,
            investigated: false,
            investigated_by: None,
            investigated_at: None,
            investigation_notes: None,
            created_at: Utc::now(),
        };
        e.mark_investigated(Uuid::new_v4(), Some("benign".into()), Utc::now())
            .unwrap();
        assert!(e
            .mark_investigated(Uuid::new_v4(), None, Utc::now())
            .is_err());
    }
}
