//! Wearable integration repository.

use chrono::NaiveDate;
use domain::models::wearable::{
    CreateConnectionRequest, DailyActivityRequest, WearableDailyActivity, WearableWorkout,
    WearableWorkoutRequest, WearableWorkoutStats,
};
use domain::models::{WearableConnection, WearablePlatform};
use serde_json::json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::{
    WearableConnectionEntity, WearableDailyActivityEntity, WearablePlatformEntity, WearableWorkoutEntity,
    WearableWorkoutStatsEntity,
};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct WearableRepository {
    pool: PgPool,
}

impl WearableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn list_platforms(&self, active_only: bool) -> Result<Vec<WearablePlatform>, sqlx::Error> {
        let timer = QueryTimer::new("list_wearable_platforms");
        let rows = sqlx::query_as::<_, WearablePlatformEntity>(
            "SELECT * FROM wearable_platforms WHERE (NOT $1 OR is_active) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_platform(&self, id: Uuid) -> Result<Option<WearablePlatform>, sqlx::Error> {
        let timer = QueryTimer::new("find_wearable_platform");
        let result = sqlx::query_as::<_, WearablePlatformEntity>("SELECT * FROM wearable_platforms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    // Connections

    pub async fn create_connection(
        &self,
        tenant_id: Uuid,
        request: &CreateConnectionRequest,
    ) -> Result<WearableConnection, sqlx::Error> {
        let timer = QueryTimer::new("create_wearable_connection");
        let result = sqlx::query_as::<_, WearableConnectionEntity>(
            r#"
            INSERT INTO wearable_connections (tenant_id, member_id, platform_id, external_user_id, external_username)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.member_id)
        .bind(request.platform_id)
        .bind(&request.external_user_id)
        .bind(&request.external_username)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_connection(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WearableConnection>, sqlx::Error> {
        let timer = QueryTimer::new("find_wearable_connection");
        let result = sqlx::query_as::<_, WearableConnectionEntity>(
            "SELECT * FROM wearable_connections WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_member_connections(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
    ) -> Result<Vec<WearableConnection>, sqlx::Error> {
        let timer = QueryTimer::new("list_member_wearable_connections");
        let rows = sqlx::query_as::<_, WearableConnectionEntity>(
            "SELECT * FROM wearable_connections WHERE tenant_id = $1 AND member_id = $2 ORDER BY created_at",
        )
        .bind(tenant_id)
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn save_connection<'e, E: PgExecutor<'e>>(
        executor: E,
        connection: &WearableConnection,
    ) -> Result<WearableConnection, sqlx::Error> {
        let timer = QueryTimer::new("update_wearable_connection");
        let result = sqlx::query_as::<_, WearableConnectionEntity>(
            r#"
            UPDATE wearable_connections
            SET external_user_id = $3, external_username = $4, access_token = $5, refresh_token = $6,
                token_expires_at = $7, status = $8, sync_enabled = $9, sync_status = $10,
                last_sync_at = $11, last_sync_error = $12, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(connection.id)
        .bind(connection.tenant_id)
        .bind(&connection.external_user_id)
        .bind(&connection.external_username)
        .bind(&connection.access_token)
        .bind(&connection.refresh_token)
        .bind(connection.token_expires_at)
        .bind(connection.status.as_str())
        .bind(connection.sync_enabled)
        .bind(connection.sync_status.as_str())
        .bind(connection.last_sync_at)
        .bind(&connection.last_sync_error)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn update_connection(&self, connection: &WearableConnection) -> Result<WearableConnection, sqlx::Error> {
        Self::save_connection(&self.pool, connection).await
    }

    pub async fn delete_connection(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_wearable_connection");
        let result = sqlx::query("DELETE FROM wearable_connections WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    // Daily activity

    /// Inserts or replaces the day's activity for the connection.
    pub async fn upsert_daily_activity(
        &self,
        connection: &WearableConnection,
        request: &DailyActivityRequest,
    ) -> Result<WearableDailyActivity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_wearable_daily_activity");
        let result = sqlx::query_as::<_, WearableDailyActivityEntity>(
            r#"
            INSERT INTO wearable_daily_activities (
                tenant_id, member_id, connection_id, activity_date, steps, distance_meters,
                calories_total, active_minutes, sleep_minutes, resting_heart_rate, raw_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (connection_id, activity_date) DO UPDATE
            SET steps = EXCLUDED.steps,
                distance_meters = EXCLUDED.distance_meters,
                calories_total = EXCLUDED.calories_total,
                active_minutes = EXCLUDED.active_minutes,
                sleep_minutes = EXCLUDED.sleep_minutes,
                resting_heart_rate = EXCLUDED.resting_heart_rate,
                raw_data = EXCLUDED.raw_data,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(connection.tenant_id)
        .bind(connection.member_id)
        .bind(connection.id)
        .bind(request.activity_date)
        .bind(request.steps)
        .bind(request.distance_meters)
        .bind(request.calories_total)
        .bind(request.active_minutes)
        .bind(request.sleep_minutes)
        .bind(request.resting_heart_rate)
        .bind(request.raw_data.clone().unwrap_or_else(|| json!({})))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn member_daily_activities(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WearableDailyActivity>, sqlx::Error> {
        let timer = QueryTimer::new("member_wearable_daily_activities");
        let rows = sqlx::query_as::<_, WearableDailyActivityEntity>(
            r#"
            SELECT * FROM wearable_daily_activities
            WHERE tenant_id = $1 AND member_id = $2 AND activity_date BETWEEN $3 AND $4
            ORDER BY activity_date DESC
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // Workouts

    /// Records a workout; a repeated external id returns the stored row with `false`.
    pub async fn record_workout(
        &self,
        connection: &WearableConnection,
        request: &WearableWorkoutRequest,
    ) -> Result<(WearableWorkout, bool), sqlx::Error> {
        let timer = QueryTimer::new("record_wearable_workout");
        let inserted = sqlx::query_as::<_, WearableWorkoutEntity>(
            r#"
            INSERT INTO wearable_workouts (
                tenant_id, member_id, connection_id, external_id, activity_type, started_at,
                duration_seconds, distance_meters, calories, avg_heart_rate, raw_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (connection_id, external_id) WHERE external_id IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(connection.tenant_id)
        .bind(connection.member_id)
        .bind(connection.id)
        .bind(&request.external_id)
        .bind(&request.activity_type)
        .bind(request.started_at)
        .bind(request.duration_seconds)
        .bind(request.distance_meters)
        .bind(request.calories)
        .bind(request.avg_heart_rate)
        .bind(request.raw_data.clone().unwrap_or_else(|| json!({})))
        .fetch_optional(&self.pool)
        .await?;

        let result = match inserted {
            Some(row) => (row.into(), true),
            None => {
                let existing = sqlx::query_as::<_, WearableWorkoutEntity>(
                    "SELECT * FROM wearable_workouts WHERE connection_id = $1 AND external_id = $2",
                )
                .bind(connection.id)
                .bind(&request.external_id)
                .fetch_one(&self.pool)
                .await?;
                (existing.into(), false)
            }
        };
        timer.record();
        Ok(result)
    }

    pub async fn list_member_workouts(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WearableWorkout>, sqlx::Error> {
        let timer = QueryTimer::new("list_member_wearable_workouts");
        let rows = sqlx::query_as::<_, WearableWorkoutEntity>(
            r#"
            SELECT * FROM wearable_workouts
            WHERE tenant_id = $1 AND member_id = $2
            ORDER BY started_at DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn member_workout_stats(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
    ) -> Result<WearableWorkoutStats, sqlx::Error> {
        let timer = QueryTimer::new("member_wearable_workout_stats");
        let row = sqlx::query_as::<_, WearableWorkoutStatsEntity>(
            r#"
            SELECT COUNT(*) AS total_workouts,
                   COALESCE(SUM(duration_seconds), 0)::bigint AS total_duration_seconds,
                   COALESCE(SUM(calories), 0)::bigint AS total_calories
            FROM wearable_workouts
            WHERE tenant_id = $1 AND member_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(row.into())
    }
}
