//! ZATCA e-invoicing submission entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{ZatcaStatus, ZatcaSubmission};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ZatcaSubmissionEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub invoice_hash: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub clearance_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ZatcaSubmissionEntity> for ZatcaSubmission {
    fn from(entity: ZatcaSubmissionEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            invoice_id: entity.invoice_id,
            invoice_number: entity.invoice_number,
            invoice_hash: entity.invoice_hash,
            payload: entity.payload,
            status: ZatcaStatus::from_str(&entity.status).unwrap_or(ZatcaStatus::Pending),
            attempts: entity.attempts,
            submitted_at: entity.submitted_at,
            responded_at: entity.responded_at,
            clearance_id: entity.clearance_id,
            rejection_reason: entity.rejection_reason,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
