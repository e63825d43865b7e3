//! A member's reservation against a class session.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum BookingStatus {
        Confirmed => "CONFIRMED",
        Waitlisted => "WAITLISTED",
        Cancelled => "CANCELLED",
        CheckedIn => "CHECKED_IN",
        NoShow => "NO_SHOW",
    }
}

impl BookingStatus {
    /// Statuses that hold a seat or a waitlist place.
    pub fn is_open(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Waitlisted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub member_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Uuid>,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist_position: Option<i32>,
    pub class_deducted: bool,
    pub booked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn cancel(&mut self, now: DateTime<Utc>, reason: Option<String>) -> Result<BookingStatus, DomainError> {
        ensure_state(
            self.status.is_open(),
            format!("Cannot cancel booking in status {}", self.status),
        )?;
        let previous = self.status;
        self.status = BookingStatus::Cancelled;
        self.waitlist_position = None;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        Ok(previous)
    }

    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == BookingStatus::Confirmed,
            format!("Cannot check in booking in status {}", self.status),
        )?;
        self.status = BookingStatus::CheckedIn;
        self.checked_in_at = Some(now);
        Ok(())
    }

    pub fn mark_no_show(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status == BookingStatus::Confirmed,
            format!("Cannot mark booking in status {} as no-show", self.status),
        )?;
        self.status = BookingStatus::NoShow;
        Ok(())
    }

    pub fn promote(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == BookingStatus::Waitlisted,
            "Only waitlisted bookings can be promoted",
        )?;
        self.status = BookingStatus::Confirmed;
        self.waitlist_position = None;
        self.promoted_at = Some(now);
        Ok(())
    }

    pub fn can_be_deleted(&self) -> bool {
        matches!(self.status, BookingStatus::Cancelled | BookingStatus::NoShow)
    }
}

/// One line of a session roster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub booking_id: Uuid,
    pub member_id: Uuid,
    pub member_name: String,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist_position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// An open booking with its session's schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBooking {
    pub booking_id: Uuid,
    pub session_id: Uuid,
    pub class_id: Uuid,
    pub class_name: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist_position: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub session_id: Uuid,
    pub member_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateBookingsRequest {
    pub session_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 member ids are required"))]
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkBookingIdsRequest {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 booking ids are required"))]
    pub booking_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            subscription_id: None,
            status,
            waitlist_position: if status == BookingStatus::Waitlisted { Some(1) } else { None },
            class_deducted: false,
            booked_at: Utc::now(),
            cancelled_at: None,
            cancellation_reason: None,
            checked_in_at: None,
            promoted_at: None,
        }
    }

    #[test]
    fn test_cancel_returns_previous_status() {
        let mut b = booking(BookingStatus::Waitlisted);
        assert_eq!(b.cancel(Utc::now(), None).unwrap(), BookingStatus::Waitlisted);
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert!(b.waitlist_position.is_none());
        assert!(b.cancel(Utc::now(), None).is_err());
    }

    #[test]
    fn test_check_in_only_confirmed() {
        let mut b = booking(BookingStatus::Confirmed);
        b.check_in(Utc::now()).unwrap();
        assert_eq!(b.status, BookingStatus::CheckedIn);
        assert!(booking(BookingStatus::Waitlisted).check_in(Utc::now()).is_err());
    }

    #[test]
    fn test_no_show_and_delete_rules() {
        let mut b = booking(BookingStatus::Confirmed);
        assert!(!b.can_be_deleted());
        b.mark_no_show().unwrap();
        assert!(b.can_be_deleted());
        assert!(b.mark_no_show().is_err());
        assert!(booking(BookingStatus::Cancelled).can_be_deleted());
        assert!(!booking(BookingStatus::CheckedIn).can_be_deleted());
    }

    #[test]
    fn test_promote() {
        let mut b = booking(BookingStatus::Waitlisted);
        b.promote(Utc::now()).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert!(b.promoted_at.is_some());
        assert!(b.promote(Utc::now()).is_err());
    }
}
