//! Class booking entity (database row mapping).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domain::models::{Booking, BookingStatus, RosterEntry, UpcomingBooking};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the class_bookings table.
#[derive(Debug, Clone, FromRow)]
pub struct BookingEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub member_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub status: String,
    pub waitlist_position: Option<i32>,
    pub class_deducted: bool,
    pub booked_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub promoted_at: Option<DateTime<Utc>>,
}

impl From<BookingEntity> for Booking {
    fn from(entity: BookingEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            session_id: entity.session_id,
            member_id: entity.member_id,
            subscription_id: entity.subscription_id,
            status: BookingStatus::from_str(&entity.status).unwrap_or(BookingStatus::Cancelled),
            waitlist_position: entity.waitlist_position,
            class_deducted: entity.class_deducted,
            booked_at: entity.booked_at,
            cancelled_at: entity.cancelled_at,
            cancellation_reason: entity.cancellation_reason,
            checked_in_at: entity.checked_in_at,
            promoted_at: entity.promoted_at,
        }
    }
}

/// Roster line: a booking joined with its member's name.
#[derive(Debug, Clone, FromRow)]
pub struct RosterEntryEntity {
    pub booking_id: Uuid,
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub waitlist_position: Option<i32>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// Upcoming booking joined with its session's schedule.
#[derive(Debug, Clone, FromRow)]
pub struct UpcomingBookingEntity {
    pub booking_id: Uuid,
    pub session_id: Uuid,
    pub class_id: Uuid,
    pub class_name: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub waitlist_position: Option<i32>,
}

impl From<RosterEntryEntity> for RosterEntry {
    fn from(entity: RosterEntryEntity) -> Self {
        Self {
            booking_id: entity.booking_id,
            member_id: entity.member_id,
            member_name: format!("{} {}", entity.first_name, entity.last_name),
            status: BookingStatus::from_str(&entity.status).unwrap_or(BookingStatus::Cancelled),
            waitlist_position: entity.waitlist_position,
            checked_in_at: entity.checked_in_at,
        }
    }
}

impl From<UpcomingBookingEntity> for UpcomingBooking {
    fn from(entity: UpcomingBookingEntity) -> Self {
        Self {
            booking_id: entity.booking_id,
            session_id: entity.session_id,
            class_id: entity.class_id,
            class_name: entity.class_name,
            session_date: entity.session_date,
            start_time: entity.start_time,
            end_time: entity.end_time,
            status: BookingStatus::from_str(&entity.status).unwrap_or(BookingStatus::Cancelled),
            waitlist_position: entity.waitlist_position,
        }
    }
}
