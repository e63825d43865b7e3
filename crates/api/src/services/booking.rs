//! Class booking flows.
//!
//! Every change to a session's seat or waitlist counters happens inside one
//! transaction that holds the session row lock. The session is always locked
//! before any of its bookings.

use chrono::{DateTime, Utc};
use domain::models::booking::BookingStatus;
use domain::models::class_session::Reservation;
use domain::models::{Booking, ClassSession, SubscriptionStatus};
use persistence::repositories::{
    BookingRepository, ClassSessionRepository, MemberRepository, SubscriptionRepository,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::ApiError;

pub struct BookingService {
    pool: PgPool,
}

impl BookingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_session(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<ClassSession, ApiError> {
        ClassSessionRepository::lock_by_id(conn, tenant_id, session_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Class session not found".to_string()))
    }

    async fn lock_booking(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, ApiError> {
        BookingRepository::lock_by_id(conn, tenant_id, booking_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))
    }

    async fn session_of(&self, tenant_id: Uuid, booking_id: Uuid) -> Result<Uuid, ApiError> {
        BookingRepository::new(self.pool.clone())
            .find_by_id(tenant_id, booking_id)
            .await?
            .map(|b| b.session_id)
            .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))
    }

    /// Books a member into a session, or onto its waitlist when it is full.
    pub async fn book(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Booking, ApiError> {
        let member = MemberRepository::new(self.pool.clone())
            .find_by_id(tenant_id, member_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
        if !member.is_active() {
            return Err(ApiError::Conflict(format!(
                "Member is not active (status {})",
                member.status
            )));
        }

        let mut tx = self.pool.begin().await?;
        let mut session = Self::lock_session(&mut tx, tenant_id, session_id).await?;

        if BookingRepository::has_open_booking(&mut tx, session_id, member_id).await? {
            return Err(ApiError::Conflict(
                "Member already has a booking for this session".to_string(),
            ));
        }
        if BookingRepository::member_has_overlap(
            &mut tx,
            tenant_id,
            member_id,
            session_id,
            session.session_date,
            session.start_time,
            session.end_time,
        )
        .await?
        {
            return Err(ApiError::Conflict(
                "Member already has a booking that overlaps this session".to_string(),
            ));
        }

        let (status, position) = match session.reserve()? {
            Reservation::Confirmed => (BookingStatus::Confirmed, None),
            Reservation::Waitlisted { position } => (BookingStatus::Waitlisted, Some(position)),
        };

        let subscription_id = SubscriptionRepository::lock_active_for_member(
            &mut tx,
            tenant_id,
            member_id,
            now.date_naive(),
        )
        .await?
        .map(|s| s.id);

        let booking = BookingRepository::insert(
            &mut tx,
            tenant_id,
            session_id,
            member_id,
            subscription_id,
            status,
            position,
            now,
        )
        .await?;
        ClassSessionRepository::save(&mut *tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            booking_id = %booking.id,
            session_id = %session_id,
            member_id = %member_id,
            status = %booking.status,
            "Booking created"
        );

        Ok(booking)
    }

    /// Cancels a booking. A freed seat goes to the head of the waitlist.
    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Booking, ApiError> {
        let session_id = self.session_of(tenant_id, booking_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut session = Self::lock_session(&mut tx, tenant_id, session_id).await?;
        let mut booking = Self::lock_booking(&mut tx, tenant_id, booking_id).await?;

        let previous = booking.cancel(now, reason)?;
        let cancelled = BookingRepository::save(&mut *tx, &booking).await?;

        match previous {
            BookingStatus::Confirmed => {
                session.release_seat();
                if let Some(mut next) = BookingRepository::lock_next_waitlisted(&mut tx, session_id).await? {
                    session.promote_from_waitlist()?;
                    next.promote(now)?;
                    BookingRepository::save(&mut *tx, &next).await?;
                    tracing::info!(
                        booking_id = %next.id,
                        session_id = %session_id,
                        "Waitlisted booking promoted"
                    );
                }
            }
            _ => session.release_waitlist_place(),
        }

        BookingRepository::renumber_waitlist(&mut tx, session_id).await?;
        ClassSessionRepository::save(&mut *tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            booking_id = %booking_id,
            previous_status = %previous,
            "Booking cancelled"
        );

        Ok(cancelled)
    }

    /// Checks a confirmed booking in, deducting a class when the session's
    /// class counts against the plan and the subscription is limited.
    pub async fn check_in(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Booking, ApiError> {
        let session_id = self.session_of(tenant_id, booking_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut session = Self::lock_session(&mut tx, tenant_id, session_id).await?;
        let mut booking = Self::lock_booking(&mut tx, tenant_id, booking_id).await?;

        booking.check_in(now)?;

        if session.deducts_class_from_plan && !booking.class_deducted {
            if let Some(subscription_id) = booking.subscription_id {
                let subscription =
                    SubscriptionRepository::lock_by_id(&mut tx, tenant_id, subscription_id).await?;
                if let Some(mut sub) = subscription {
                    if sub.status == SubscriptionStatus::Active && !sub.has_unlimited_classes() {
                        sub.use_class()?;
                        SubscriptionRepository::save(&mut *tx, &sub).await?;
                        booking.class_deducted = true;
                    }
                }
            }
        }

        session.record_check_in();
        let booking = BookingRepository::save(&mut *tx, &booking).await?;
        ClassSessionRepository::save(&mut *tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            booking_id = %booking_id,
            class_deducted = booking.class_deducted,
            "Booking checked in"
        );

        Ok(booking)
    }

    pub async fn mark_no_show(&self, tenant_id: Uuid, booking_id: Uuid) -> Result<Booking, ApiError> {
        let repo = BookingRepository::new(self.pool.clone());
        let mut booking = repo
            .find_by_id(tenant_id, booking_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;
        booking.mark_no_show()?;
        Ok(BookingRepository::save(&self.pool, &booking).await?)
    }

    /// Cancels a scheduled session together with all of its open bookings.
    pub async fn cancel_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(ClassSession, u64), ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut session = Self::lock_session(&mut tx, tenant_id, session_id).await?;
        session.cancel(reason)?;

        let cancelled = BookingRepository::cancel_all_for_session(
            &mut tx,
            session_id,
            session.cancellation_reason.as_deref(),
            now,
        )
        .await?;
        session.booked_count = 0;
        session.waitlist_count = 0;

        let session = ClassSessionRepository::save(&mut *tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            session_id = %session_id,
            bookings_cancelled = cancelled,
            "Class session cancelled"
        );

        Ok((session, cancelled))
    }
}
