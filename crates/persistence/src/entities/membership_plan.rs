//! Membership plan entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::membership_plan::BillingPeriod;
use domain::models::MembershipPlan;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the membership_plans table.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipPlanEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub currency: String,
    pub billing_period: String,
    pub duration_days: i32,
    pub max_classes: Option<i32>,
    pub freeze_days_allowed: i32,
    pub guest_passes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MembershipPlanEntity> for MembershipPlan {
    fn from(entity: MembershipPlanEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            description: entity.description,
            price: entity.price,
            currency: entity.currency.trim().to_string(),
            billing_period: BillingPeriod::from_str(&entity.billing_period)
                .unwrap_or(BillingPeriod::Monthly),
            duration_days: entity.duration_days,
            max_classes: entity.max_classes,
            freeze_days_allowed: entity.freeze_days_allowed,
            guest_passes: entity.guest_passes,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
