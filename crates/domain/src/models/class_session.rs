//! A scheduled instance of a class with its capacity counters.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum SessionStatus {
        Scheduled => "SCHEDULED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
}

/// Outcome of reserving a place in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Confirmed,
    Waitlisted { position: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub class_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub booked_count: i32,
    pub waitlist_count: i32,
    pub checked_in_count: i32,
    pub waitlist_enabled: bool,
    pub max_waitlist_size: i32,
    pub deducts_class_from_plan: bool,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassSession {
    pub fn available_spots(&self) -> i32 {
        (self.capacity - self.booked_count).max(0)
    }

    pub fn has_available_spots(&self) -> bool {
        self.available_spots() > 0
    }

    pub fn waitlist_has_room(&self) -> bool {
        self.waitlist_enabled && self.waitlist_count < self.max_waitlist_size
    }

    /// True if `[start, end)` on `date` intersects this session.
    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.session_date == date && self.start_time < end && start < self.end_time
    }

    /// Takes a seat if one is free, else a waitlist place, and updates the counters.
    pub fn reserve(&mut self) -> Result<Reservation, DomainError> {
        ensure_state(
            self.status == SessionStatus::Scheduled,
            format!("Cannot book a session in status {}", self.status),
        )?;
        if self.has_available_spots() {
            self.booked_count += 1;
            Ok(Reservation::Confirmed)
        } else if self.waitlist_has_room() {
            self.waitlist_count += 1;
            Ok(Reservation::Waitlisted {
                position: self.waitlist_count,
            })
        } else {
            Err(DomainError::state(
                "Session is full and waitlist is not available",
            ))
        }
    }

    /// Frees a confirmed seat.
    pub fn release_seat(&mut self) {
        self.booked_count = (self.booked_count - 1).max(0);
    }

    /// Frees a waitlist place.
    pub fn release_waitlist_place(&mut self) {
        self.waitlist_count = (self.waitlist_count - 1).max(0);
    }

    /// Moves the head of the waitlist into a free seat.
    pub fn promote_from_waitlist(&mut self) -> Result<(), DomainError> {
        ensure_state(self.waitlist_count > 0, "Waitlist is empty")?;
        ensure_state(self.has_available_spots(), "No seat available for promotion")?;
        self.waitlist_count -= 1;
        self.booked_count += 1;
        Ok(())
    }

    pub fn record_check_in(&mut self) {
        self.checked_in_count += 1;
    }

    pub fn start(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status == SessionStatus::Scheduled,
            format!("Cannot start session in status {}", self.status),
        )?;
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        ensure_state(
            matches!(self.status, SessionStatus::Scheduled | SessionStatus::InProgress),
            format!("Cannot complete session in status {}", self.status),
        )?;
        self.status = SessionStatus::Completed;
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>) -> Result<(), DomainError> {
        ensure_state(
            self.status == SessionStatus::Scheduled,
            format!("Cannot cancel session in status {}", self.status),
        )?;
        self.status = SessionStatus::Cancelled;
        self.cancellation_reason = reason;
        Ok(())
    }
}

/// Checks a session's time window.
pub fn validate_time_window(start: NaiveTime, end: NaiveTime) -> Result<(), DomainError> {
    ensure_argument(end > start, "Session end time must be after start time")
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub class_id: Uuid,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    /// Defaults to start time plus the class duration.
    pub end_time: Option<NaiveTime>,
    /// Overrides the class trainer.
    pub trainer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    #[validate(range(min = 1, max = 500, message = "Capacity must be 1-500"))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelSessionRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub class_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<SessionStatus>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    pub(crate) fn session(capacity: i32, max_waitlist: i32) -> ClassSession {
        ClassSession {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            class_id: Uuid::new_v4(),
            trainer_id: None,
            location_id: None,
            session_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            start_time: t(9, 0),
            end_time: t(10, 0),
            capacity,
            booked_count: 0,
            waitlist_count: 0,
            checked_in_count: 0,
            waitlist_enabled: true,
            max_waitlist_size: max_waitlist,
            deducts_class_from_plan: true,
            status: SessionStatus::Scheduled,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_reserve_fills_seats_then_waitlist_then_rejects() {
        let mut s = session(2, 1);
        assert_eq!(s.reserve().unwrap(), Reservation::Confirmed);
        assert_eq!(s.reserve().unwrap(), Reservation::Confirmed);
        assert_eq!(s.reserve().unwrap(), Reservation::Waitlisted { position: 1 });
        assert_eq!(
            s.reserve(),
            Err(DomainError::state("Session is full and waitlist is not available"))
        );
        assert_eq!(s.booked_count, 2);
        assert_eq!(s.waitlist_count, 1);
    }

    #[test]
    fn test_reserve_without_waitlist() {
        let mut s = session(1, 5);
        s.waitlist_enabled = false;
        s.reserve().unwrap();
        assert!(s.reserve().is_err());
    }

    #[test]
    fn test_reserve_requires_scheduled() {
        let mut s = session(5, 0);
        s.cancel(None).unwrap();
        assert!(s.reserve().is_err());
    }

    #[test]
    fn test_promotion() {
        let mut s = session(1, 3);
        s.reserve().unwrap();
        s.reserve().unwrap();
        assert!(s.promote_from_waitlist().is_err());
        s.release_seat();
        s.promote_from_waitlist().unwrap();
        assert_eq!(s.booked_count, 1);
        assert_eq!(s.waitlist_count, 0);
    }

    #[test]
    fn test_overlap() {
        let s = session(10, 0);
        let day = s.session_date;
        assert!(s.overlaps(day, t(9, 30), t(10, 30)));
        assert!(s.overlaps(day, t(8, 0), t(11, 0)));
        assert!(!s.overlaps(day, t(10, 0), t(11, 0)));
        assert!(!s.overlaps(day, t(8, 0), t(9, 0)));
        assert!(!s.overlaps(day.succ_opt().unwrap(), t(9, 0), t(10, 0)));
    }

    #[test]
    fn test_lifecycle() {
        let mut s = session(10, 0);
        s.start().unwrap();
        assert!(s.cancel(None).is_err());
        s.complete().unwrap();
        assert!(s.start().is_err());
    }

    #[test]
    fn test_time_window() {
        assert!(validate_time_window(t(9, 0), t(10, 0)).is_ok());
        assert!(validate_time_window(t(10, 0), t(10, 0)).is_err());
    }
}
