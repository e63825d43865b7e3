//! Equipment integration repository: provider catalogue, tenant provider
//! configs, units and imported workouts.

use chrono::{DateTime, Utc};
use domain::models::equipment::{
    CreateEquipmentUnitRequest, CreateProviderConfigRequest, EquipmentUnitQuery, RecordWorkoutRequest,
    WorkoutStats, DEFAULT_SYNC_INTERVAL_MINUTES,
};
use domain::models::{EquipmentProvider, EquipmentProviderConfig, EquipmentUnit, EquipmentWorkout};
use serde_json::json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::{
    EquipmentProviderConfigEntity, EquipmentProviderEntity, EquipmentUnitEntity, EquipmentWorkoutEntity,
    WorkoutStatsEntity,
};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: PgPool,
}

impl EquipmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Providers

    pub async fn list_providers(&self, active_only: bool) -> Result<Vec<EquipmentProvider>, sqlx::Error> {
        let timer = QueryTimer::new("list_equipment_providers");
        let rows = sqlx::query_as::<_, EquipmentProviderEntity>(
            "SELECT * FROM equipment_providers WHERE (NOT $1 OR is_active) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_provider(&self, id: Uuid) -> Result<Option<EquipmentProvider>, sqlx::Error> {
        let timer = QueryTimer::new("find_equipment_provider");
        let result = sqlx::query_as::<_, EquipmentProviderEntity>(
            "SELECT * FROM equipment_providers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    // Provider configs

    pub async fn create_config(
        &self,
        tenant_id: Uuid,
        request: &CreateProviderConfigRequest,
    ) -> Result<EquipmentProviderConfig, sqlx::Error> {
        let timer = QueryTimer::new("create_equipment_provider_config");
        let result = sqlx::query_as::<_, EquipmentProviderConfigEntity>(
            r#"
            INSERT INTO equipment_provider_configs (
                tenant_id, provider_id, api_key, api_secret, settings, sync_interval_minutes
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.provider_id)
        .bind(&request.api_key)
        .bind(&request.api_secret)
        .bind(request.settings.clone().unwrap_or_else(|| json!({})))
        .bind(request.sync_interval_minutes.unwrap_or(DEFAULT_SYNC_INTERVAL_MINUTES))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_config(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<EquipmentProviderConfig>, sqlx::Error> {
        let timer = QueryTimer::new("find_equipment_provider_config");
        let result = sqlx::query_as::<_, EquipmentProviderConfigEntity>(
            "SELECT * FROM equipment_provider_configs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn config_exists_for_provider(&self, tenant_id: Uuid, provider_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("equipment_config_exists_for_provider");
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM equipment_provider_configs WHERE tenant_id = $1 AND provider_id = $2)",
        )
        .bind(tenant_id)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(exists)
    }

    pub async fn list_configs(&self, tenant_id: Uuid) -> Result<Vec<EquipmentProviderConfig>, sqlx::Error> {
        let timer = QueryTimer::new("list_equipment_provider_configs");
        let rows = sqlx::query_as::<_, EquipmentProviderConfigEntity>(
            "SELECT * FROM equipment_provider_configs WHERE tenant_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_config(
        &self,
        config: &EquipmentProviderConfig,
    ) -> Result<EquipmentProviderConfig, sqlx::Error> {
        Self::save_config(&self.pool, config).await
    }

    pub async fn save_config<'e, E: PgExecutor<'e>>(
        executor: E,
        config: &EquipmentProviderConfig,
    ) -> Result<EquipmentProviderConfig, sqlx::Error> {
        let timer = QueryTimer::new("update_equipment_provider_config");
        let result = sqlx::query_as::<_, EquipmentProviderConfigEntity>(
            r#"
            UPDATE equipment_provider_configs
            SET api_key = $3, api_secret = $4, oauth_access_token = $5, oauth_refresh_token = $6,
                oauth_token_expires_at = $7, sync_enabled = $8, sync_interval_minutes = $9,
                settings = $10, status = $11, last_sync_at = $12, last_error = $13, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(config.id)
        .bind(config.tenant_id)
        .bind(&config.api_key)
        .bind(&config.api_secret)
        .bind(&config.oauth_access_token)
        .bind(&config.oauth_refresh_token)
        .bind(config.oauth_token_expires_at)
        .bind(config.sync_enabled)
        .bind(config.sync_interval_minutes)
        .bind(&config.settings)
        .bind(config.status.as_str())
        .bind(config.last_sync_at)
        .bind(&config.last_error)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete_config(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_equipment_provider_config");
        let result = sqlx::query("DELETE FROM equipment_provider_configs WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    // Units

    pub async fn create_unit(
        &self,
        tenant_id: Uuid,
        request: &CreateEquipmentUnitRequest,
    ) -> Result<EquipmentUnit, sqlx::Error> {
        let timer = QueryTimer::new("create_equipment_unit");
        let result = sqlx::query_as::<_, EquipmentUnitEntity>(
            r#"
            INSERT INTO equipment_units (
                tenant_id, provider_config_id, location_id, external_id, name, equipment_type,
                model, serial_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.provider_config_id)
        .bind(request.location_id)
        .bind(&request.external_id)
        .bind(&request.name)
        .bind(request.equipment_type.as_str())
        .bind(&request.model)
        .bind(&request.serial_number)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_unit(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<EquipmentUnit>, sqlx::Error> {
        let timer = QueryTimer::new("find_equipment_unit");
        let result = sqlx::query_as::<_, EquipmentUnitEntity>(
            "SELECT * FROM equipment_units WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_units(
        &self,
        tenant_id: Uuid,
        query: &EquipmentUnitQuery,
    ) -> Result<Vec<EquipmentUnit>, sqlx::Error> {
        let timer = QueryTimer::new("list_equipment_units");
        let rows = sqlx::query_as::<_, EquipmentUnitEntity>(
            r#"
            SELECT * FROM equipment_units
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR location_id = $2)
              AND ($3::text IS NULL OR equipment_type = $3)
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .bind(query.location_id)
        .bind(query.equipment_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_unit(&self, unit: &EquipmentUnit) -> Result<EquipmentUnit, sqlx::Error> {
        let timer = QueryTimer::new("update_equipment_unit");
        let result = sqlx::query_as::<_, EquipmentUnitEntity>(
            r#"
            UPDATE equipment_units
            SET location_id = $3, name = $4, equipment_type = $5, model = $6, serial_number = $7,
                is_connected = $8, last_seen_at = $9, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(unit.id)
        .bind(unit.tenant_id)
        .bind(unit.location_id)
        .bind(&unit.name)
        .bind(unit.equipment_type.as_str())
        .bind(&unit.model)
        .bind(&unit.serial_number)
        .bind(unit.is_connected)
        .bind(unit.last_seen_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete_unit(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_equipment_unit");
        let result = sqlx::query("DELETE FROM equipment_units WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    // Workouts

    /// Records a workout. A repeated external id for the same provider config
    /// returns the stored row with `false`.
    pub async fn record_workout(
        &self,
        tenant_id: Uuid,
        request: &RecordWorkoutRequest,
    ) -> Result<(EquipmentWorkout, bool), sqlx::Error> {
        let timer = QueryTimer::new("record_equipment_workout");
        let inserted = sqlx::query_as::<_, EquipmentWorkoutEntity>(
            r#"
            INSERT INTO equipment_workouts (
                tenant_id, member_id, provider_config_id, unit_id, external_id, equipment_type,
                started_at, duration_seconds, calories, distance_meters, avg_heart_rate, metrics
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (provider_config_id, external_id) WHERE external_id IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.member_id)
        .bind(request.provider_config_id)
        .bind(request.unit_id)
        .bind(&request.external_id)
        .bind(request.equipment_type.as_str())
        .bind(request.started_at)
        .bind(request.duration_seconds)
        .bind(request.calories)
        .bind(request.distance_meters)
        .bind(request.avg_heart_rate)
        .bind(request.metrics.clone().unwrap_or_else(|| json!({})))
        .fetch_optional(&self.pool)
        .await?;

        let result = match inserted {
            Some(row) => (row.into(), true),
            None => {
                let existing = sqlx::query_as::<_, EquipmentWorkoutEntity>(
                    r#"
                    SELECT * FROM equipment_workouts
                    WHERE tenant_id = $1 AND provider_config_id = $2 AND external_id = $3
                    "#,
                )
                .bind(tenant_id)
                .bind(request.provider_config_id)
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
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<EquipmentWorkout>, sqlx::Error> {
        let timer = QueryTimer::new("list_member_equipment_workouts");
        let rows = sqlx::query_as::<_, EquipmentWorkoutEntity>(
            r#"
            SELECT * FROM equipment_workouts
            WHERE tenant_id = $1 AND member_id = $2 AND ($3::timestamptz IS NULL OR started_at >= $3)
            ORDER BY started_at DESC
            LIMIT $4
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn member_workout_stats(&self, tenant_id: Uuid, member_id: Uuid) -> Result<WorkoutStats, sqlx::Error> {
        let timer = QueryTimer::new("member_equipment_workout_stats");
        let row = sqlx::query_as::<_, WorkoutStatsEntity>(
            r#"
            SELECT COUNT(*) AS total_workouts,
                   COALESCE(SUM(duration_seconds), 0)::bigint AS total_duration_seconds,
                   COALESCE(SUM(calories), 0)::bigint AS total_calories,
                   COALESCE(SUM(distance_meters), 0)::bigint AS total_distance_meters
            FROM equipment_workouts
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
