//! Attendance (club visits) and club locations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};
use crate::models::member::Member;
use crate::models::subscription::Subscription;

db_enum! {
    pub enum AttendanceStatus {
        CheckedIn => "CHECKED_IN",
        CheckedOut => "CHECKED_OUT",
    }
}

db_enum! {
    pub enum CheckInMethod {
        Manual => "MANUAL",
        QrCode => "QR_CODE",
        Card => "CARD",
        Kiosk => "KIOSK",
    }
}

/// A physical club branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One visit of a member to a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub location_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Uuid>,
    pub status: AttendanceStatus,
    pub check_in_method: CheckInMethod,
    pub check_in_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_in_by: Option<Uuid>,
}

impl AttendanceRecord {
    pub fn duration_minutes(&self) -> Option<i64> {
        self.check_out_time
            .map(|out| (out - self.check_in_time).num_minutes())
    }
}

/// Checks every precondition of a club check-in.
///
/// `open_visit` is the member's current CHECKED_IN record, if any. On success
/// the subscription has had one class deducted when its plan is limited.
pub fn validate_check_in(
    member: &Member,
    location: &Location,
    subscription: Option<&mut Subscription>,
    open_visit: Option<&AttendanceRecord>,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    ensure_state(
        member.is_active(),
        format!("Member is not active (status {})", member.status),
    )?;
    ensure_state(location.is_active, "Location is not active")?;
    let subscription = subscription
        .filter(|s| s.is_active_on(now.date_naive()))
        .ok_or_else(|| DomainError::state("Member has no active subscription"))?;
    ensure_state(open_visit.is_none(), "Member is already checked in")?;
    ensure_state(
        subscription.has_classes_available(),
        "No classes remaining on subscription",
    )?;
    subscription.use_class()
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub member_id: Uuid,
    pub location_id: Uuid,
    pub method: Option<CheckInMethod>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: Option<i32>,

    pub is_active: Option<bool>,
}

/// Headline attendance numbers for a dashboard.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub today: i64,
    pub currently_checked_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::{Gender, MemberStatus};
    use crate::models::subscription::{SubscriptionStatus, tests::subscription};

    fn member(status: MemberStatus) -> Member {
        Member {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: None,
            first_name: "Lina".into(),
            last_name: "Saad".into(),
            email: "lina@example.com".into(),
            phone: None,
            date_of_birth: None,
            gender: Gender::Female,
            status,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn location(active: bool) -> Location {
        Location {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Main".into(),
            address: None,
            capacity: None,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn current_subscription() -> Subscription {
        let mut sub = subscription(SubscriptionStatus::Active);
        let today = Utc::now().date_naive();
        sub.start_date = today;
        sub.end_date = today + chrono::Duration::days(30);
        sub
    }

    fn open_visit() -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            subscription_id: None,
            status: AttendanceStatus::CheckedIn,
            check_in_method: CheckInMethod::Manual,
            check_in_time: Utc::now(),
            check_out_time: None,
            checked_in_by: None,
        }
    }

    #[test]
    fn test_check_in_deducts_a_class() {
        let mut sub = current_subscription();
        sub.classes_remaining = Some(3);
        validate_check_in(
            &member(MemberStatus::Active),
            &location(true),
            Some(&mut sub),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(sub.classes_remaining, Some(2));
    }

    #[test]
    fn test_check_in_requires_active_member() {
        let mut sub = current_subscription();
        let err = validate_check_in(
            &member(MemberStatus::Frozen),
            &location(true),
            Some(&mut sub),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not active"));
    }

    #[test]
    fn test_check_in_requires_active_subscription() {
        let err = validate_check_in(
            &member(MemberStatus::Active),
            &location(true),
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::state("Member has no active subscription"));

        let mut frozen = current_subscription();
        frozen.status = SubscriptionStatus::Frozen;
        assert!(validate_check_in(
            &member(MemberStatus::Active),
            &location(true),
            Some(&mut frozen),
            None,
            Utc::now(),
        )
        .is_err());
    }

    #[test]
    fn test_check_in_rejects_open_visit_and_inactive_location() {
        let mut sub = current_subscription();
        assert_eq!(
            validate_check_in(
                &member(MemberStatus::Active),
                &location(true),
                Some(&mut sub),
                Some(&open_visit()),
                Utc::now(),
            )
            .unwrap_err(),
            DomainError::state("Member is already checked in")
        );
        assert!(validate_check_in(
            &member(MemberStatus::Active),
            &location(false),
            Some(&mut sub),
            None,
            Utc::now(),
        )
        .is_err());
    }

    #[test]
    fn test_check_in_with_no_classes_left() {
        let mut sub = current_subscription();
        sub.classes_remaining = Some(0);
        let err = validate_check_in(
            &member(MemberStatus::Active),
            &location(true),
            Some(&mut sub),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::state("No classes remaining on subscription"));
    }

    #[test]
    fn test_duration() {
        let mut visit = open_visit();
        assert_eq!(visit.duration_minutes(), None);
        visit.check_out_time = Some(visit.check_in_time + chrono::Duration::minutes(75));
        assert_eq!(visit.duration_minutes(), Some(75));
    }
}
