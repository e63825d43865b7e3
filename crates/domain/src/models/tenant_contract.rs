//! Service contracts between the platform and a club.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum TenantContractStatus {
        Draft => "DRAFT",
        Sent => "SENT",
        Signed => "SIGNED",
        Active => "ACTIVE",
        Expired => "EXPIRED",
        Terminated => "TERMINATED",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContract {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub contract_number: String,
    pub title: String,
    pub status: TenantContractStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Monthly platform fee in minor units.
    pub monthly_fee: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantContract {
    pub fn validate_period(start: NaiveDate, end: NaiveDate) -> Result<(), DomainError> {
        ensure_argument(end > start, "Contract end date must be after start date")
    }

    fn require(&self, expected: TenantContractStatus, action: &str) -> Result<(), DomainError> {
        ensure_state(
            self.status == expected,
            format!("Cannot {} contract in status {}", action, self.status),
        )
    }

    pub fn send(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(TenantContractStatus::Draft, "send")?;
        self.status = TenantContractStatus::Sent;
        self.sent_at = Some(now);
        Ok(())
    }

    pub fn sign(&mut self, signed_by: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(TenantContractStatus::Sent, "sign")?;
        self.status = TenantContractStatus::Signed;
        self.signed_at = Some(now);
        self.signed_by = Some(signed_by);
        Ok(())
    }

    pub fn activate(&mut self) -> Result<(), DomainError> {
        self.require(TenantContractStatus::Signed, "activate")?;
        self.status = TenantContractStatus::Active;
        Ok(())
    }

    /// Expires an active contract once its end date has passed.
    pub fn expire_if_due(&mut self, today: NaiveDate) -> bool {
        if self.status == TenantContractStatus::Active && today > self.end_date {
            self.status = TenantContractStatus::Expired;
            true
        } else {
            false
        }
    }

    pub fn terminate(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(TenantContractStatus::Active, "terminate")?;
        self.status = TenantContractStatus::Terminated;
        self.terminated_at = Some(now);
        self.termination_reason = Some(reason);
        Ok(())
    }

    /// Withdraws a contract that was never signed.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            matches!(
                self.status,
                TenantContractStatus::Draft | TenantContractStatus::Sent
            ),
            format!("Cannot cancel contract in status {}", self.status),
        )?;
        self.status = TenantContractStatus::Terminated;
        self.terminated_at = Some(now);
        self.termination_reason = reason;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantContractRequest {
    pub tenant_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 0, max = 100000000000i64, message = "Monthly fee must be 0-100000000000"))]
    pub monthly_fee: i64,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    #[validate(length(max = 20000))]
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignTenantContractRequest {
    #[validate(length(min = 1, max = 200, message = "Signer name must be 1-200 characters"))]
    pub signed_by: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TerminateTenantContractRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContractQuery {
    pub tenant_id: Option<Uuid>,
    pub status: Option<TenantContractStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> TenantContract {
        TenantContract {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            contract_number: "TC-2024-00001".into(),
            title: "Platform subscription".into(),
            status: TenantContractStatus::Draft,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            monthly_fee: 99900,
            currency: "SAR".into(),
            terms: None,
            sent_at: None,
            signed_at: None,
            signed_by: None,
            terminated_at: None,
            termination_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut c = contract();
        assert!(c.sign("Owner".into(), Utc::now()).is_err());
        c.send(Utc::now()).unwrap();
        c.sign("Owner".into(), Utc::now()).unwrap();
        assert!(c.cancel(None, Utc::now()).is_err());
        c.activate().unwrap();

        assert!(!c.expire_if_due(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert!(c.expire_if_due(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert_eq!(c.status, TenantContractStatus::Expired);
        assert!(c.terminate("late".into(), Utc::now()).is_err());
    }

    #[test]
    fn test_cancel_before_signature() {
        let mut c = contract();
        c.send(Utc::now()).unwrap();
        c.cancel(Some("renegotiating".into()), Utc::now()).unwrap();
        assert_eq!(c.status, TenantContractStatus::Terminated);
    }

    #[test]
    fn test_terminate_active() {
        let mut c = contract();
        c.send(Utc::now()).unwrap();
        c.sign("Owner".into(), Utc::now()).unwrap();
        c.activate().unwrap();
        c.terminate("club closed".into(), Utc::now()).unwrap();
        assert_eq!(c.termination_reason.as_deref(), Some("club closed"));
    }

    #[test]
    fn test_period() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(TenantContract::validate_period(d, d).is_err());
    }
}
