//! Data export request and security event entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{DataExportRequest, ExportRequestStatus, SecurityEvent, Severity};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the data_export_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct DataExportRequestEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub requested_by: Uuid,
    pub status: String,
    pub reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub download_url: Option<String>,
    pub download_expires_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DataExportRequestEntity> for DataExportRequest {
    fn from(entity: DataExportRequestEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            requested_by: entity.requested_by,
            status: ExportRequestStatus::from_str(&entity.status)
                .unwrap_or(ExportRequestStatus::Failed),
            reason: entity.reason,
            reviewed_by: entity.reviewed_by,
            reviewed_at: entity.reviewed_at,
            rejection_reason: entity.rejection_reason,
            download_url: entity.download_url,
            download_expires_at: entity.download_expires_at,
            error_message: entity.error_message,
            completed_at: entity.completed_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the security_events table.
#[derive(Debug, Clone, FromRow)]
pub struct SecurityEventEntity {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub event_type: String,
    pub severity: String,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub description: String,
    pub details: serde_json::Value,
    pub investigated: bool,
    pub investigated_by: Option<Uuid>,
    pub investigated_at: Option<DateTime<Utc>>,
    pub investigation_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SecurityEventEntity> for SecurityEvent {
    fn from(entity: SecurityEventEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            event_type: entity.event_type,
            severity: Severity::from_str(&entity.severity).unwrap_or(Severity::Low),
            user_id: entity.user_id,
            ip_address: entity.ip_address,
            user_agent: entity.user_agent,
            description: entity.description,
            details: entity.details,
            investigated: entity.investigated,
            investigated_by: entity.investigated_by,
            investigated_at: entity.investigated_at,
            investigation_notes: entity.investigation_notes,
            created_at: entity.created_at,
        }
    }
}

/// Event counts grouped by severity.
#[derive(Debug, Clone, FromRow)]
pub struct SeverityCountEntity {
    pub severity: String,
    pub total: i64,
    pub uninvestigated: i64,
}
