//! Subscription entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{Subscription, SubscriptionStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the subscriptions table.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub classes_remaining: Option<i32>,
    pub guest_passes_remaining: i32,
    pub freeze_days_remaining: i32,
    pub frozen_at: Option<NaiveDate>,
    pub price: i64,
    pub paid_amount: i64,
    pub auto_renew: bool,
    pub past_due_at: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    pub cancellation_effective_date: Option<NaiveDate>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionEntity> for Subscription {
    fn from(entity: SubscriptionEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            plan_id: entity.plan_id,
            status: SubscriptionStatus::from_str(&entity.status)
                .unwrap_or(SubscriptionStatus::Suspended),
            start_date: entity.start_date,
            end_date: entity.end_date,
            classes_remaining: entity.classes_remaining,
            guest_passes_remaining: entity.guest_passes_remaining,
            freeze_days_remaining: entity.freeze_days_remaining,
            frozen_at: entity.frozen_at,
            price: entity.price,
            paid_amount: entity.paid_amount,
            auto_renew: entity.auto_renew,
            past_due_at: entity.past_due_at,
            suspended_at: entity.suspended_at,
            cancellation_requested_at: entity.cancellation_requested_at,
            cancellation_effective_date: entity.cancellation_effective_date,
            cancellation_reason: entity.cancellation_reason,
            cancelled_at: entity.cancelled_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
