//! Subscription domain model and lifecycle.
//!
//! A subscription binds a member to a plan for a date range. All transitions
//! are plain methods that validate the current status and mutate the fields;
//! the caller persists the result.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};
use crate::models::membership_plan::MembershipPlan;

db_enum! {
    pub enum SubscriptionStatus {
        Active => "ACTIVE",
        Frozen => "FROZEN",
        Cancelled => "CANCELLED",
        Expired => "EXPIRED",
        PendingPayment => "PENDING_PAYMENT",
        PastDue => "PAST_DUE",
        Suspended => "SUSPENDED",
        PendingCancellation => "PENDING_CANCELLATION",
    }
}

pub const DEFAULT_NOTICE_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// `None` means unlimited.
    pub classes_remaining: Option<i32>,
    pub guest_passes_remaining: i32,
    pub freeze_days_remaining: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_at: Option<NaiveDate>,
    pub price: i64,
    pub paid_amount: i64,
    pub auto_renew: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past_due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_effective_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values needed to insert a new subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub classes_remaining: Option<i32>,
    pub guest_passes_remaining: i32,
    pub freeze_days_remaining: i32,
    pub price: i64,
    pub paid_amount: i64,
    pub auto_renew: bool,
}

impl NewSubscription {
    /// Copies the plan's limits into a subscription starting on `start_date`.
    pub fn from_plan(
        plan: &MembershipPlan,
        member_id: Uuid,
        start_date: NaiveDate,
        awaiting_payment: bool,
        auto_renew: bool,
    ) -> Result<Self, DomainError> {
        ensure_state(plan.is_active, "Membership plan is not active")?;
        let (status, paid_amount) = if awaiting_payment && plan.price > 0 {
            (SubscriptionStatus::PendingPayment, 0)
        } else {
            (SubscriptionStatus::Active, plan.price)
        };
        Ok(Self {
            member_id,
            plan_id: plan.id,
            status,
            start_date,
            end_date: start_date + Duration::days(plan.duration_days as i64),
            classes_remaining: plan.max_classes,
            guest_passes_remaining: plan.guest_passes,
            freeze_days_remaining: plan.freeze_days_allowed,
            price: plan.price,
            paid_amount,
            auto_renew,
        })
    }
}

impl Subscription {
    fn require(&self, allowed: &[SubscriptionStatus], action: &str) -> Result<(), DomainError> {
        ensure_state(
            allowed.contains(&self.status),
            format!("Cannot {} subscription in status {}", action, self.status),
        )
    }

    /// ACTIVE and not past its end date.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date >= today
    }

    pub fn has_unlimited_classes(&self) -> bool {
        self.classes_remaining.is_none()
    }

    pub fn has_classes_available(&self) -> bool {
        self.classes_remaining.map_or(true, |n| n > 0)
    }

    pub fn freeze(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        self.require(&[SubscriptionStatus::Active], "freeze")?;
        ensure_state(self.freeze_days_remaining > 0, "No freeze days remaining")?;
        self.status = SubscriptionStatus::Frozen;
        self.frozen_at = Some(today);
        Ok(())
    }

    /// Unfreezes and extends the end date by the number of frozen days.
    pub fn unfreeze(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        self.require(&[SubscriptionStatus::Frozen], "unfreeze")?;
        let frozen_days = self
            .frozen_at
            .map(|since| (today - since).num_days().max(0))
            .unwrap_or(0);
        self.freeze_days_remaining =
            (self.freeze_days_remaining as i64 - frozen_days).max(0) as i32;
        self.end_date += Duration::days(frozen_days);
        self.frozen_at = None;
        self.status = SubscriptionStatus::Active;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status != SubscriptionStatus::Cancelled,
            "Subscription is already cancelled",
        )?;
        self.status = SubscriptionStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(())
    }

    pub fn renew(&mut self, new_end_date: NaiveDate) -> Result<(), DomainError> {
        self.require(
            &[SubscriptionStatus::Active, SubscriptionStatus::Expired],
            "renew",
        )?;
        ensure_argument(
            new_end_date > self.end_date,
            "New end date must be after the current end date",
        )?;
        self.end_date = new_end_date;
        self.status = SubscriptionStatus::Active;
        Ok(())
    }

    /// Expires an ACTIVE subscription whose end date has passed.
    /// Returns whether anything changed.
    pub fn expire_if_due(&mut self, today: NaiveDate) -> bool {
        if self.status == SubscriptionStatus::Active && self.end_date < today {
            self.status = SubscriptionStatus::Expired;
            true
        } else {
            false
        }
    }

    pub fn use_class(&mut self) -> Result<(), DomainError> {
        ensure_state(self.has_classes_available(), "No classes remaining")?;
        if let Some(n) = self.classes_remaining.as_mut() {
            *n -= 1;
        }
        Ok(())
    }

    /// Gives back a class consumed by a booking that was later refunded.
    pub fn restore_class(&mut self) {
        if let Some(n) = self.classes_remaining.as_mut() {
            *n += 1;
        }
    }

    pub fn use_guest_pass(&mut self) -> Result<(), DomainError> {
        ensure_state(self.guest_passes_remaining > 0, "No guest passes remaining")?;
        self.guest_passes_remaining -= 1;
        Ok(())
    }

    pub fn confirm_payment(&mut self, amount: i64) -> Result<(), DomainError> {
        self.require(&[SubscriptionStatus::PendingPayment], "confirm payment for")?;
        ensure_argument(amount > 0, "Payment amount must be positive")?;
        self.paid_amount += amount;
        self.status = SubscriptionStatus::Active;
        Ok(())
    }

    pub fn mark_past_due(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(&[SubscriptionStatus::Active], "mark past due")?;
        self.status = SubscriptionStatus::PastDue;
        self.past_due_at = Some(now);
        Ok(())
    }

    pub fn suspend(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(
            &[SubscriptionStatus::Active, SubscriptionStatus::PastDue],
            "suspend",
        )?;
        self.status = SubscriptionStatus::Suspended;
        self.suspended_at = Some(now);
        Ok(())
    }

    pub fn reactivate(&mut self) -> Result<(), DomainError> {
        self.require(
            &[SubscriptionStatus::Suspended, SubscriptionStatus::PastDue],
            "reactivate",
        )?;
        self.status = SubscriptionStatus::Active;
        self.past_due_at = None;
        self.suspended_at = None;
        Ok(())
    }

    /// Starts the notice period; the subscription stays usable until the effective date.
    pub fn request_cancellation(
        &mut self,
        now: DateTime<Utc>,
        notice_days: i64,
        reason: Option<String>,
    ) -> Result<NaiveDate, DomainError> {
        self.require(&[SubscriptionStatus::Active], "request cancellation of")?;
        ensure_argument(notice_days >= 0, "Notice period must not be negative")?;
        let effective = now.date_naive() + Duration::days(notice_days);
        self.status = SubscriptionStatus::PendingCancellation;
        self.cancellation_requested_at = Some(now);
        self.cancellation_effective_date = Some(effective);
        self.cancellation_reason = reason;
        Ok(effective)
    }

    pub fn complete_cancellation(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(
            &[SubscriptionStatus::PendingCancellation],
            "complete cancellation of",
        )?;
        if let Some(effective) = self.cancellation_effective_date {
            self.end_date = effective;
        }
        self.status = SubscriptionStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(())
    }

    pub fn withdraw_cancellation(&mut self) -> Result<(), DomainError> {
        self.require(
            &[SubscriptionStatus::PendingCancellation],
            "withdraw cancellation of",
        )?;
        self.status = SubscriptionStatus::Active;
        self.cancellation_requested_at = None;
        self.cancellation_effective_date = None;
        self.cancellation_reason = None;
        Ok(())
    }

    /// True for a pending cancellation whose effective date has arrived.
    pub fn is_cancellation_due(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::PendingCancellation
            && self
                .cancellation_effective_date
                .map_or(false, |d| d <= today)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub awaiting_payment: bool,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenewSubscriptionRequest {
    pub new_end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestCancellationRequest {
    #[validate(range(min = 0, max = 365, message = "Notice period must be 0-365 days"))]
    pub notice_days: Option<i64>,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionQuery {
    pub member_id: Option<Uuid>,
    pub status: Option<SubscriptionStatus>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn subscription(status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            status,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 1, 31),
            classes_remaining: Some(5),
            guest_passes_remaining: 1,
            freeze_days_remaining: 10,
            frozen_at: None,
            price: 20000,
            paid_amount: 20000,
            auto_renew: false,
            past_due_at: None,
            suspended_at: None,
            cancellation_requested_at: None,
            cancellation_effective_date: None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_plan_copies_limits() {
        let plan = MembershipPlan {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Ten classes".into(),
            description: None,
            price: 50000,
            currency: "SAR".into(),
            billing_period: crate::models::membership_plan::BillingPeriod::Monthly,
            duration_days: 30,
            max_classes: Some(10),
            freeze_days_allowed: 7,
            guest_passes: 2,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let member_id = Uuid::new_v4();

        let new = NewSubscription::from_plan(&plan, member_id, date(2024, 3, 1), false, true).unwrap();
        assert_eq!(new.status, SubscriptionStatus::Active);
        assert_eq!(new.end_date, date(2024, 3, 31));
        assert_eq!(new.classes_remaining, Some(10));
        assert_eq!(new.freeze_days_remaining, 7);
        assert_eq!(new.paid_amount, 50000);

        let pending = NewSubscription::from_plan(&plan, member_id, date(2024, 3, 1), true, false).unwrap();
        assert_eq!(pending.status, SubscriptionStatus::PendingPayment);
        assert_eq!(pending.paid_amount, 0);

        let inactive = MembershipPlan { is_active: false, ..plan };
        assert!(NewSubscription::from_plan(&inactive, member_id, date(2024, 3, 1), false, false).is_err());
    }

    #[test]
    fn test_freeze_requires_active_and_days() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.freeze(date(2024, 1, 10)).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Frozen);
        assert_eq!(sub.frozen_at, Some(date(2024, 1, 10)));

        let mut no_days = subscription(SubscriptionStatus::Active);
        no_days.freeze_days_remaining = 0;
        assert_eq!(
            no_days.freeze(date(2024, 1, 10)),
            Err(DomainError::state("No freeze days remaining"))
        );

        assert!(subscription(SubscriptionStatus::Expired).freeze(date(2024, 1, 10)).is_err());
    }

    #[test]
    fn test_unfreeze_extends_end_date() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.freeze(date(2024, 1, 10)).unwrap();
        sub.unfreeze(date(2024, 1, 14)).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.end_date, date(2024, 2, 4));
        assert_eq!(sub.freeze_days_remaining, 6);
        assert!(sub.frozen_at.is_none());
    }

    #[test]
    fn test_unfreeze_floors_freeze_days_at_zero() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.freeze(date(2024, 1, 1)).unwrap();
        sub.unfreeze(date(2024, 1, 21)).unwrap();
        assert_eq!(sub.freeze_days_remaining, 0);
        assert_eq!(sub.end_date, date(2024, 2, 20));
    }

    #[test]
    fn test_unfreeze_requires_frozen() {
        let mut sub = subscription(SubscriptionStatus::Active);
        let err = sub.unfreeze(date(2024, 1, 2)).unwrap_err();
        assert_eq!(err.to_string(), "Cannot unfreeze subscription in status ACTIVE");
    }

    #[test]
    fn test_cancel_once() {
        let mut sub = subscription(SubscriptionStatus::Frozen);
        sub.cancel(Utc::now()).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        assert!(sub.cancelled_at.is_some());
        assert!(sub.cancel(Utc::now()).is_err());
    }

    #[test]
    fn test_renew() {
        let mut expired = subscription(SubscriptionStatus::Expired);
        expired.renew(date(2024, 3, 1)).unwrap();
        assert_eq!(expired.status, SubscriptionStatus::Active);
        assert_eq!(expired.end_date, date(2024, 3, 1));

        let mut active = subscription(SubscriptionStatus::Active);
        assert!(matches!(
            active.renew(date(2024, 1, 15)),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(subscription(SubscriptionStatus::Cancelled).renew(date(2024, 3, 1)).is_err());
    }

    #[test]
    fn test_expire_only_after_end_date() {
        let mut sub = subscription(SubscriptionStatus::Active);
        assert!(!sub.expire_if_due(date(2024, 1, 31)));
        assert!(sub.is_active_on(date(2024, 1, 31)));
        assert!(sub.expire_if_due(date(2024, 2, 1)));
        assert_eq!(sub.status, SubscriptionStatus::Expired);

        let mut frozen = subscription(SubscriptionStatus::Frozen);
        assert!(!frozen.expire_if_due(date(2024, 6, 1)));
    }

    #[test]
    fn test_use_class_limited_and_unlimited() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.classes_remaining = Some(1);
        sub.use_class().unwrap();
        assert_eq!(sub.classes_remaining, Some(0));
        assert!(!sub.has_classes_available());
        assert!(sub.use_class().is_err());
        sub.restore_class();
        assert_eq!(sub.classes_remaining, Some(1));

        let mut unlimited = subscription(SubscriptionStatus::Active);
        unlimited.classes_remaining = None;
        for _ in 0..100 {
            unlimited.use_class().unwrap();
        }
        assert!(unlimited.has_unlimited_classes());
    }

    #[test]
    fn test_guest_pass() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.use_guest_pass().unwrap();
        assert!(sub.use_guest_pass().is_err());
    }

    #[test]
    fn test_payment_flow() {
        let mut sub = subscription(SubscriptionStatus::PendingPayment);
        sub.paid_amount = 0;
        assert!(sub.confirm_payment(0).is_err());
        sub.confirm_payment(20000).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.paid_amount, 20000);

        sub.mark_past_due(Utc::now()).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        sub.suspend(Utc::now()).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Suspended);
        sub.reactivate().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.past_due_at.is_none());
        assert!(sub.suspended_at.is_none());
    }

    #[test]
    fn test_cancellation_notice_period() {
        let mut sub = subscription(SubscriptionStatus::Active);
        let now = Utc::now();
        let effective = sub
            .request_cancellation(now, 30, Some("Moving away".into()))
            .unwrap();
        assert_eq!(effective, now.date_naive() + Duration::days(30));
        assert_eq!(sub.status, SubscriptionStatus::PendingCancellation);
        assert!(!sub.is_cancellation_due(now.date_naive()));
        assert!(sub.is_cancellation_due(effective));

        sub.complete_cancellation(now).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        assert_eq!(sub.end_date, effective);
    }

    #[test]
    fn test_withdraw_cancellation() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.request_cancellation(Utc::now(), 30, None).unwrap();
        sub.withdraw_cancellation().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.cancellation_effective_date.is_none());
        assert!(sub.withdraw_cancellation().is_err());
    }
}
