//! Membership plan domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum BillingPeriod {
        OneTime => "ONE_TIME",
        Monthly => "MONTHLY",
        Quarterly => "QUARTERLY",
        Annual => "ANNUAL",
    }
}

/// A purchasable plan; subscriptions copy its limits when created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlan {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price: i64,
    pub currency: String,
    pub billing_period: BillingPeriod,
    pub duration_days: i32,
    /// `None` means unlimited classes.
    pub max_classes: Option<i32>,
    pub freeze_days_allowed: i32,
    pub guest_passes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipPlan {
    pub fn activate(&mut self) -> Result<(), DomainError> {
        ensure_state(!self.is_active, "Plan is already active")?;
        self.is_active = true;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), DomainError> {
        ensure_state(self.is_active, "Plan is already inactive")?;
        self.is_active = false;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0, max = 100000000000i64, message = "Price must be 0-100000000000"))]
    pub price: i64,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,

    pub billing_period: BillingPeriod,

    #[validate(range(min = 1, max = 3660, message = "Duration must be 1-3660 days"))]
    pub duration_days: i32,

    #[validate(range(min = 1, message = "Class limit must be positive when set"))]
    pub max_classes: Option<i32>,

    #[validate(range(min = 0, max = 365, message = "Freeze days must be 0-365"))]
    #[serde(default)]
    pub freeze_days_allowed: i32,

    #[validate(range(min = 0, max = 100, message = "Guest passes must be 0-100"))]
    #[serde(default)]
    pub guest_passes: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0, max = 100000000000i64, message = "Price must be 0-100000000000"))]
    pub price: Option<i64>,

    #[validate(range(min = 1, max = 3660, message = "Duration must be 1-3660 days"))]
    pub duration_days: Option<i32>,

    #[validate(range(min = 0, max = 365, message = "Freeze days must be 0-365"))]
    pub freeze_days_allowed: Option<i32>,

    #[validate(range(min = 0, max = 100, message = "Guest passes must be 0-100"))]
    pub guest_passes: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> MembershipPlan {
        MembershipPlan {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Gold".into(),
            description: None,
            price: 29900,
            currency: "SAR".into(),
            billing_period: BillingPeriod::Monthly,
            duration_days: 30,
            max_classes: None,
            freeze_days_allowed: 14,
            guest_passes: 2,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_activation_toggle() {
        let mut p = plan();
        assert!(p.activate().is_err());
        p.deactivate().unwrap();
        assert!(!p.is_active);
        assert!(p.deactivate().is_err());
        p.activate().unwrap();
        assert!(p.is_active);
    }

    #[test]
    fn test_create_request_rejects_negative_price() {
        let request = CreatePlanRequest {
            name: "Basic".into(),
            description: None,
            price: -1,
            currency: None,
            billing_period: BillingPeriod::Monthly,
            duration_days: 30,
            max_classes: Some(0),
            freeze_days_allowed: 0,
            guest_passes: 0,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("price"));
        assert!(errors.field_errors().contains_key("max_classes"));
    }
}
