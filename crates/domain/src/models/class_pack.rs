//! Class packs (prepaid bundles of classes) and members' balances.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};
use crate::models::invoice::MAX_AMOUNT;

db_enum! {
    pub enum ClassPackBalanceStatus {
        Active => "ACTIVE",
        Depleted => "DEPLETED",
        Expired => "EXPIRED",
        Cancelled => "CANCELLED",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPack {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub class_count: i32,
    pub price: i64,
    /// Days a purchased balance stays usable; `None` never expires.
    pub validity_days: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassPack {
    pub fn validate_terms(class_count: i32, price: i64) -> Result<(), DomainError> {
        ensure_argument(class_count > 0, "Class count must be positive")?;
        ensure_argument(price >= 0, "Price must not be negative")?;
        ensure_argument(price <= MAX_AMOUNT, "Amount too large")
    }

    pub fn activate(&mut self) -> Result<(), DomainError> {
        ensure_state(!self.is_active, "Class pack is already active")?;
        self.is_active = true;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), DomainError> {
        ensure_state(self.is_active, "Class pack is already inactive")?;
        self.is_active = false;
        Ok(())
    }

    /// Packs can only be removed once inactive and unused.
    pub fn ensure_deletable(&self, balances_with_credits: i64) -> Result<(), DomainError> {
        ensure_state(!self.is_active, "Deactivate the class pack before deleting it")?;
        ensure_state(
            balances_with_credits == 0,
            "Class pack has members with remaining credits",
        )
    }

    pub fn expiry_from(&self, granted_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.validity_days
            .map(|days| granted_at + Duration::days(days as i64))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPackBalance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub class_pack_id: Uuid,
    pub classes_total: i32,
    pub classes_remaining: i32,
    pub status: ClassPackBalanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassPackBalance {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == ClassPackBalanceStatus::Active
            && self.classes_remaining > 0
            && self.expires_at.map_or(true, |e| e > now)
    }

    pub fn use_credit(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == ClassPackBalanceStatus::Active
            && self.expires_at.map_or(false, |e| e <= now)
        {
            self.status = ClassPackBalanceStatus::Expired;
        }
        ensure_state(
            self.is_usable(now),
            format!("Class pack balance is not usable (status {})", self.status),
        )?;
        self.classes_remaining -= 1;
        if self.classes_remaining == 0 {
            self.status = ClassPackBalanceStatus::Depleted;
        }
        Ok(())
    }

    pub fn refund_credit(&mut self) -> Result<(), DomainError> {
        ensure_state(
            matches!(
                self.status,
                ClassPackBalanceStatus::Active | ClassPackBalanceStatus::Depleted
            ),
            format!("Cannot refund a credit to a balance in status {}", self.status),
        )?;
        ensure_state(
            self.classes_remaining < self.classes_total,
            "Balance already holds all of its credits",
        )?;
        self.classes_remaining += 1;
        self.status = ClassPackBalanceStatus::Active;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status != ClassPackBalanceStatus::Cancelled,
            "Balance is already cancelled",
        )?;
        self.status = ClassPackBalanceStatus::Cancelled;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassPackRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub class_count: i32,

    pub price: i64,

    #[validate(range(min = 1, max = 3660, message = "Validity must be 1-3660 days"))]
    pub validity_days: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassPackRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub class_count: Option<i32>,

    pub price: Option<i64>,

    #[validate(range(min = 1, max = 3660, message = "Validity must be 1-3660 days"))]
    pub validity_days: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantBalanceRequest {
    pub member_id: Uuid,
    pub class_pack_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(active: bool) -> ClassPack {
        ClassPack {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "10 classes".into(),
            description: None,
            class_count: 10,
            price: 45000,
            validity_days: Some(90),
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn balance(remaining: i32) -> ClassPackBalance {
        ClassPackBalance {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            class_pack_id: Uuid::new_v4(),
            classes_total: 2,
            classes_remaining: remaining,
            status: ClassPackBalanceStatus::Active,
            expires_at: None,
            granted_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_terms() {
        assert!(ClassPack::validate_terms(10, 0).is_ok());
        assert!(ClassPack::validate_terms(0, 100).is_err());
        assert!(ClassPack::validate_terms(5, -1).is_err());
        assert!(ClassPack::validate_terms(5, MAX_AMOUNT + 1).is_err());
    }

    #[test]
    fn test_activation_toggles() {
        let mut p = pack(false);
        p.activate().unwrap();
        assert!(p.is_active);
        assert!(p.activate().is_err());
        p.deactivate().unwrap();
        assert!(!p.is_active);
    }

    #[test]
    fn test_delete_rules() {
        assert!(pack(true).ensure_deletable(0).is_err());
        assert!(pack(false).ensure_deletable(3).is_err());
        assert!(pack(false).ensure_deletable(0).is_ok());
    }

    #[test]
    fn test_expiry() {
        let p = pack(true);
        let now = Utc::now();
        assert_eq!(p.expiry_from(now), Some(now + Duration::days(90)));
        let forever = ClassPack { validity_days: None, ..p };
        assert_eq!(forever.expiry_from(now), None);
    }

    #[test]
    fn test_use_until_depleted_then_refund() {
        let mut b = balance(2);
        b.use_credit(Utc::now()).unwrap();
        b.use_credit(Utc::now()).unwrap();
        assert_eq!(b.status, ClassPackBalanceStatus::Depleted);
        assert!(b.use_credit(Utc::now()).is_err());

        b.refund_credit().unwrap();
        assert_eq!(b.status, ClassPackBalanceStatus::Active);
        assert_eq!(b.classes_remaining, 1);
    }

    #[test]
    fn test_refund_cannot_exceed_total() {
        let mut b = balance(2);
        assert!(b.refund_credit().is_err());
    }

    #[test]
    fn test_expired_balance_cannot_be_used() {
        let mut b = balance(2);
        b.expires_at = Some(Utc::now() - Duration::days(1));
        assert!(b.use_credit(Utc::now()).is_err());
        assert_eq!(b.status, ClassPackBalanceStatus::Expired);
    }

    #[test]
    fn test_cancel() {
        let mut b = balance(1);
        b.cancel().unwrap();
        assert!(b.cancel().is_err());
        assert!(!b.is_usable(Utc::now()));
    }
}
