//! E-invoice submissions to the tax authority (ZATCA).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum ZatcaStatus {
        Pending => "PENDING",
        Submitted => "SUBMITTED",
        Accepted => "ACCEPTED",
        Rejected => "REJECTED",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZatcaSubmission {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub invoice_number: String,
    /// SHA-256 hex of the submitted payload.
    pub invoice_hash: String,
    pub payload: Value,
    pub status: ZatcaStatus,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ZatcaSubmission {
    pub fn mark_submitted(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == ZatcaStatus::Pending,
            format!("Cannot submit e-invoice in status {}", self.status),
        )?;
        self.status = ZatcaStatus::Submitted;
        self.submitted_at = Some(now);
        Ok(())
    }

    pub fn accept(&mut self, clearance_id: Option<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == ZatcaStatus::Submitted,
            format!("Cannot accept e-invoice in status {}", self.status),
        )?;
        self.status = ZatcaStatus::Accepted;
        self.clearance_id = clearance_id;
        self.rejection_reason = None;
        self.responded_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == ZatcaStatus::Submitted,
            format!("Cannot reject e-invoice in status {}", self.status),
        )?;
        self.status = ZatcaStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.responded_at = Some(now);
        Ok(())
    }

    /// Re-queues a rejected submission with a fresh payload hash.
    pub fn resubmit(&mut self, payload: Value, invoice_hash: String) -> Result<(), DomainError> {
        ensure_state(
            self.status == ZatcaStatus::Rejected,
            "Only rejected e-invoices can be resubmitted",
        )?;
        self.payload = payload;
        self.invoice_hash = invoice_hash;
        self.status = ZatcaStatus::Pending;
        self.attempts += 1;
        self.submitted_at = None;
        self.responded_at = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateZatcaSubmissionRequest {
    pub invoice_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ZatcaResponseRequest {
    pub accepted: bool,
    #[validate(length(max = 200))]
    pub clearance_id: Option<String>,
    #[validate(length(max = 2000))]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZatcaQuery {
    pub status: Option<ZatcaStatus>,
    pub invoice_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> ZatcaSubmission {
        ZatcaSubmission {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            invoice_number: "INV-2024-00001".into(),
            invoice_hash: "abc".into(),
            payload: Value::Null,
            status: ZatcaStatus::Pending,
            attempts: 1,
            submitted_at: None,
            responded_at: None,
            clearance_id: None,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_accept_path() {
        let mut s = submission();
        assert!(s.accept(None, Utc::now()).is_err());
        s.mark_submitted(Utc::now()).unwrap();
        s.accept(Some("CLR-1".into()), Utc::now()).unwrap();
        assert_eq!(s.status, ZatcaStatus::Accepted);
        assert!(s.resubmit(Value::Null, "h".into()).is_err());
    }

    #[test]
    fn test_reject_and_resubmit() {
        let mut s = submission();
        s.mark_submitted(Utc::now()).unwrap();
        s.reject("invalid VAT number".into(), Utc::now()).unwrap();
        s.resubmit(serde_json::json!({"v": 2}), "def".into()).unwrap();
        assert_eq!(s.status, ZatcaStatus::Pending);
        assert_eq!(s.attempts, 2);
        assert_eq!(s.invoice_hash, "def");
        assert!(s.submitted_at.is_none());
    }
}
