//! Class booking repository.
//!
//! Seat and waitlist counters live on the session row; the functions taking a
//! `PgConnection` are meant to run inside the transaction that holds that row's lock.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domain::models::{Booking, BookingStatus, RosterEntry, UpcomingBooking};
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::{BookingEntity, RosterEntryEntity, UpcomingBookingEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Booking>, sqlx::Error> {
        let timer = QueryTimer::new("find_booking_by_id");
        let result = sqlx::query_as::<_, BookingEntity>(
            "SELECT * FROM class_bookings WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn lock_by_id(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Booking>, sqlx::Error> {
        let timer = QueryTimer::new("lock_booking_by_id");
        let result = sqlx::query_as::<_, BookingEntity>(
            "SELECT * FROM class_bookings WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Whether the member already holds a CONFIRMED or WAITLISTED booking for the session.
    pub async fn has_open_booking(
        conn: &mut PgConnection,
        session_id: Uuid,
        member_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("has_open_booking");
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM class_bookings
                WHERE session_id = $1 AND member_id = $2 AND status IN ('CONFIRMED', 'WAITLISTED')
            )
            "#,
        )
        .bind(session_id)
        .bind(member_id)
        .fetch_one(conn)
        .await?;
        timer.record();
        Ok(exists)
    }

    /// Whether the member holds an open booking on another session overlapping the window.
    pub async fn member_has_overlap(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        member_id: Uuid,
        session_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("member_booking_overlap");
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM class_bookings b
                JOIN class_sessions s ON s.id = b.session_id
                WHERE b.tenant_id = $1 AND b.member_id = $2 AND b.session_id <> $3
                  AND b.status IN ('CONFIRMED', 'WAITLISTED')
                  AND s.status <> 'CANCELLED'
                  AND s.session_date = $4 AND s.start_time < $6 AND s.end_time > $5
            )
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(session_id)
        .bind(date)
        .bind(start)
        .bind(end)
        .fetch_one(conn)
        .await?;
        timer.record();
        Ok(exists)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        session_id: Uuid,
        member_id: Uuid,
        subscription_id: Option<Uuid>,
        status: BookingStatus,
        waitlist_position: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<Booking, sqlx::Error> {
        let timer = QueryTimer::new("insert_booking");
        let result = sqlx::query_as::<_, BookingEntity>(
            r#"
            INSERT INTO class_bookings (
                tenant_id, session_id, member_id, subscription_id, status, waitlist_position, booked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(session_id)
        .bind(member_id)
        .bind(subscription_id)
        .bind(status.as_str())
        .bind(waitlist_position)
        .bind(now)
        .fetch_one(conn)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn save<'e, E: PgExecutor<'e>>(executor: E, booking: &Booking) -> Result<Booking, sqlx::Error> {
        let timer = QueryTimer::new("update_booking");
        let result = sqlx::query_as::<_, BookingEntity>(
            r#"
            UPDATE class_bookings
            SET status = $3, waitlist_position = $4, class_deducted = $5, cancelled_at = $6,
                cancellation_reason = $7, checked_in_at = $8, promoted_at = $9
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(booking.tenant_id)
        .bind(booking.status.as_str())
        .bind(booking.waitlist_position)
        .bind(booking.class_deducted)
        .bind(booking.cancelled_at)
        .bind(&booking.cancellation_reason)
        .bind(booking.checked_in_at)
        .bind(booking.promoted_at)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    /// The waitlisted booking with the lowest position, locked.
    pub async fn lock_next_waitlisted(
        conn: &mut PgConnection,
        session_id: Uuid,
    ) -> Result<Option<Booking>, sqlx::Error> {
        let timer = QueryTimer::new("lock_next_waitlisted");
        let result = sqlx::query_as::<_, BookingEntity>(
            r#"
            SELECT * FROM class_bookings
            WHERE session_id = $1 AND status = 'WAITLISTED'
            ORDER BY waitlist_position, booked_at
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(session_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Re-numbers the session's waitlist 1..n in current order.
    pub async fn renumber_waitlist(conn: &mut PgConnection, session_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("renumber_waitlist");
        let result = sqlx::query(
            r#"
            UPDATE class_bookings b
            SET waitlist_position = ordered.position
            FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY waitlist_position, booked_at)::int AS position
                FROM class_bookings
                WHERE session_id = $1 AND status = 'WAITLISTED'
            ) ordered
            WHERE b.id = ordered.id
            "#,
        )
        .bind(session_id)
        .execute(conn)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Cancels every open booking of a cancelled session.
    pub async fn cancel_all_for_session(
        conn: &mut PgConnection,
        session_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("cancel_bookings_for_session");
        let result = sqlx::query(
            r#"
            UPDATE class_bookings
            SET status = 'CANCELLED', waitlist_position = NULL, cancelled_at = $2,
                cancellation_reason = COALESCE($3, 'Session cancelled')
            WHERE session_id = $1 AND status IN ('CONFIRMED', 'WAITLISTED')
            "#,
        )
        .bind(session_id)
        .bind(now)
        .bind(reason)
        .execute(conn)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Marks every still-CONFIRMED booking of the session as NO_SHOW.
    pub async fn mark_no_shows_for_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_no_shows_for_session");
        let result = sqlx::query(
            r#"
            UPDATE class_bookings SET status = 'NO_SHOW'
            WHERE tenant_id = $1 AND session_id = $2 AND status = 'CONFIRMED'
            "#,
        )
        .bind(tenant_id)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    pub async fn list_by_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        let timer = QueryTimer::new("list_bookings_by_session");
        let rows = sqlx::query_as::<_, BookingEntity>(
            r#"
            SELECT * FROM class_bookings
            WHERE tenant_id = $1 AND session_id = $2 AND ($3::text IS NULL OR status = $3)
            ORDER BY status, waitlist_position NULLS FIRST, booked_at
            "#,
        )
        .bind(tenant_id)
        .bind(session_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn list_by_member(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        page: &PageRequest,
    ) -> Result<(Vec<Booking>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_bookings_by_member");
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM class_bookings WHERE tenant_id = $1 AND member_id = $2",
        )
        .bind(tenant_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, BookingEntity>(
            r#"
            SELECT * FROM class_bookings
            WHERE tenant_id = $1 AND member_id = $2
            ORDER BY booked_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Open bookings of the member for sessions on or after `today`.
    pub async fn upcoming_for_member(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<UpcomingBooking>, sqlx::Error> {
        let timer = QueryTimer::new("upcoming_bookings_for_member");
        let rows = sqlx::query_as::<_, UpcomingBookingEntity>(
            r#"
            SELECT b.id AS booking_id, s.id AS session_id, c.id AS class_id, c.name AS class_name,
                   s.session_date, s.start_time, s.end_time, b.status, b.waitlist_position
            FROM class_bookings b
            JOIN class_sessions s ON s.id = b.session_id
            JOIN gym_classes c ON c.id = s.class_id
            WHERE b.tenant_id = $1 AND b.member_id = $2
              AND b.status IN ('CONFIRMED', 'WAITLISTED')
              AND s.status = 'SCHEDULED' AND s.session_date >= $3
            ORDER BY s.session_date, s.start_time
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Non-cancelled bookings of a session joined with member names.
    pub async fn roster(&self, tenant_id: Uuid, session_id: Uuid) -> Result<Vec<RosterEntry>, sqlx::Error> {
        let timer = QueryTimer::new("session_roster");
        let rows = sqlx::query_as::<_, RosterEntryEntity>(
            r#"
            SELECT b.id AS booking_id, m.id AS member_id, m.first_name, m.last_name,
                   b.status, b.waitlist_position, b.checked_in_at
            FROM class_bookings b
            JOIN members m ON m.id = b.member_id
            WHERE b.tenant_id = $1 AND b.session_id = $2 AND b.status <> 'CANCELLED'
            ORDER BY b.waitlist_position NULLS FIRST, m.last_name, m.first_name
            "#,
        )
        .bind(tenant_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_booking");
        let result = sqlx::query("DELETE FROM class_bookings WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
