//! Attendance (check-in/check-out) repository.

use chrono::{DateTime, Utc};
use domain::models::attendance::CheckInMethod;
use domain::models::AttendanceRecord;
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::AttendanceEntity;
use crate::metrics::QueryTimer;

/// Repository for attendance records.
///
/// Check-in writes go through the connection-scoped functions so they can share
/// the caller's transaction with the subscription update.
#[derive(Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The member's open (CHECKED_IN) visit, locked.
    pub async fn lock_open_for_member(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let timer = QueryTimer::new("lock_open_attendance");
        let result = sqlx::query_as::<_, AttendanceEntity>(
            r#"
            SELECT * FROM attendance_records
            WHERE tenant_id = $1 AND member_id = $2 AND status = 'CHECKED_IN'
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_open_for_member(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let timer = QueryTimer::new("find_open_attendance");
        let result = sqlx::query_as::<_, AttendanceEntity>(
            r#"
            SELECT * FROM attendance_records
            WHERE tenant_id = $1 AND member_id = $2 AND status = 'CHECKED_IN'
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_check_in(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        member_id: Uuid,
        location_id: Uuid,
        subscription_id: Option<Uuid>,
        method: CheckInMethod,
        checked_in_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, sqlx::Error> {
        let timer = QueryTimer::new("insert_check_in");
        let result = sqlx::query_as::<_, AttendanceEntity>(
            r#"
            INSERT INTO attendance_records (
                tenant_id, member_id, location_id, subscription_id, check_in_method,
                check_in_time, checked_in_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(location_id)
        .bind(subscription_id)
        .bind(method.as_str())
        .bind(now)
        .bind(checked_in_by)
        .fetch_one(conn)
        .await;
        timer.record();
        result.map(Into::into)
    }

    /// Closes the member's open visit. Returns `None` when nothing was open.
    pub async fn check_out(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let timer = QueryTimer::new("check_out");
        let result = sqlx::query_as::<_, AttendanceEntity>(
            r#"
            UPDATE attendance_records
            SET status = 'CHECKED_OUT', check_out_time = $3
            WHERE tenant_id = $1 AND member_id = $2 AND status = 'CHECKED_IN'
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn history_for_member(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        page: &PageRequest,
    ) -> Result<(Vec<AttendanceRecord>, i64), sqlx::Error> {
        let timer = QueryTimer::new("attendance_history_for_member");
        let total = self.count_for_member(tenant_id, member_id).await?;
        let rows = sqlx::query_as::<_, AttendanceEntity>(
            r#"
            SELECT * FROM attendance_records
            WHERE tenant_id = $1 AND member_id = $2
            ORDER BY check_in_time DESC
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

    /// Total visits of a member.
    pub async fn count_for_member(&self, tenant_id: Uuid, member_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_attendance_for_member");
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_records WHERE tenant_id = $1 AND member_id = $2",
        )
        .bind(tenant_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count)
    }

    /// Check-ins since `since` (start of the tenant's day).
    pub async fn count_since(&self, tenant_id: Uuid, since: DateTime<Utc>) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_attendance_since");
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_records WHERE tenant_id = $1 AND check_in_time >= $2",
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count)
    }

    pub async fn count_checked_in(&self, tenant_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_currently_checked_in");
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_records WHERE tenant_id = $1 AND status = 'CHECKED_IN'",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count)
    }
}
