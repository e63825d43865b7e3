//! Class session repository.

use chrono::{NaiveDate, NaiveTime};
use domain::models::class_session::SessionQuery;
use domain::models::ClassSession;
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::ClassSessionEntity;
use crate::metrics::QueryTimer;

/// Values for a new session row; defaults are resolved from the class beforehand.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub class_id: Uuid,
    pub trainer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub waitlist_enabled: bool,
    pub max_waitlist_size: i32,
    pub deducts_class_from_plan: bool,
}

#[derive(Clone)]
pub struct ClassSessionRepository {
    pool: PgPool,
}

impl ClassSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: Uuid, new: &NewSession) -> Result<ClassSession, sqlx::Error> {
        let timer = QueryTimer::new("create_class_session");
        let result = sqlx::query_as::<_, ClassSessionEntity>(
            r#"
            INSERT INTO class_sessions (
                tenant_id, class_id, trainer_id, location_id, session_date, start_time, end_time,
                capacity, waitlist_enabled, max_waitlist_size, deducts_class_from_plan
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.class_id)
        .bind(new.trainer_id)
        .bind(new.location_id)
        .bind(new.session_date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.capacity)
        .bind(new.waitlist_enabled)
        .bind(new.max_waitlist_size)
        .bind(new.deducts_class_from_plan)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ClassSession>, sqlx::Error> {
        let timer = QueryTimer::new("find_class_session_by_id");
        let result = sqlx::query_as::<_, ClassSessionEntity>(
            "SELECT * FROM class_sessions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Locks the session row; every counter change goes through this lock.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ClassSession>, sqlx::Error> {
        let timer = QueryTimer::new("lock_class_session");
        let result = sqlx::query_as::<_, ClassSessionEntity>(
            "SELECT * FROM class_sessions WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        query: &SessionQuery,
        page: &PageRequest,
    ) -> Result<(Vec<ClassSession>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_class_sessions");
        let status = query.status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM class_sessions
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR class_id = $2)
              AND ($3::uuid IS NULL OR trainer_id = $3)
              AND ($4::date IS NULL OR session_date >= $4)
              AND ($5::date IS NULL OR session_date <= $5)
              AND ($6::text IS NULL OR status = $6)
            "#,
        )
        .bind(tenant_id)
        .bind(query.class_id)
        .bind(query.trainer_id)
        .bind(query.from)
        .bind(query.to)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ClassSessionEntity>(
            r#"
            SELECT * FROM class_sessions
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR class_id = $2)
              AND ($3::uuid IS NULL OR trainer_id = $3)
              AND ($4::date IS NULL OR session_date >= $4)
              AND ($5::date IS NULL OR session_date <= $5)
              AND ($6::text IS NULL OR status = $6)
            ORDER BY session_date, start_time
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(tenant_id)
        .bind(query.class_id)
        .bind(query.trainer_id)
        .bind(query.from)
        .bind(query.to)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Whether the trainer already runs a scheduled session overlapping the window.
    pub async fn trainer_has_overlap(
        &self,
        tenant_id: Uuid,
        trainer_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_session: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("trainer_session_overlap");
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM class_sessions
                WHERE tenant_id = $1 AND trainer_id = $2 AND session_date = $3
                  AND status = 'SCHEDULED'
                  AND start_time < $5 AND end_time > $4
                  AND ($6::uuid IS NULL OR id <> $6)
            )
            "#,
        )
        .bind(tenant_id)
        .bind(trainer_id)
        .bind(date)
        .bind(start)
        .bind(end)
        .bind(exclude_session)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(exists)
    }

    /// Writes back status and counters.
    pub async fn save<'e, E: PgExecutor<'e>>(
        executor: E,
        session: &ClassSession,
    ) -> Result<ClassSession, sqlx::Error> {
        let timer = QueryTimer::new("update_class_session");
        let result = sqlx::query_as::<_, ClassSessionEntity>(
            r#"
            UPDATE class_sessions
            SET trainer_id = $3, location_id = $4, capacity = $5, booked_count = $6,
                waitlist_count = $7, checked_in_count = $8, status = $9,
                cancellation_reason = $10, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(session.trainer_id)
        .bind(session.location_id)
        .bind(session.capacity)
        .bind(session.booked_count)
        .bind(session.waitlist_count)
        .bind(session.checked_in_count)
        .bind(session.status.as_str())
        .bind(&session.cancellation_reason)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn update(&self, session: &ClassSession) -> Result<ClassSession, sqlx::Error> {
        Self::save(&self.pool, session).await
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_class_session");
        let result = sqlx::query("DELETE FROM class_sessions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
