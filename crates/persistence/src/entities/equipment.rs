//! Equipment integration entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::equipment::{AuthType, EquipmentType, ProviderConfigStatus, WorkoutStats};
use domain::models::{EquipmentProvider, EquipmentProviderConfig, EquipmentUnit, EquipmentWorkout};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the equipment_providers table.
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentProviderEntity {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub auth_type: String,
    pub api_base_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<EquipmentProviderEntity> for EquipmentProvider {
    fn from(entity: EquipmentProviderEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            name: entity.name,
            auth_type: AuthType::from_str(&entity.auth_type).unwrap_or(AuthType::None),
            api_base_url: entity.api_base_url,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the equipment_provider_configs table.
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentProviderConfigEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider_id: Uuid,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub oauth_access_token: Option<String>,
    pub oauth_refresh_token: Option<String>,
    pub oauth_token_expires_at: Option<DateTime<Utc>>,
    pub sync_enabled: bool,
    pub sync_interval_minutes: i32,
    pub settings: serde_json::Value,
    pub status: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EquipmentProviderConfigEntity> for EquipmentProviderConfig {
    fn from(entity: EquipmentProviderConfigEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            provider_id: entity.provider_id,
            api_key: entity.api_key,
            api_secret: entity.api_secret,
            oauth_access_token: entity.oauth_access_token,
            oauth_refresh_token: entity.oauth_refresh_token,
            oauth_token_expires_at: entity.oauth_token_expires_at,
            sync_enabled: entity.sync_enabled,
            sync_interval_minutes: entity.sync_interval_minutes,
            settings: entity.settings,
            status: ProviderConfigStatus::from_str(&entity.status)
                .unwrap_or(ProviderConfigStatus::Disabled),
            last_sync_at: entity.last_sync_at,
            last_error: entity.last_error,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the equipment_units table.
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentUnitEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider_config_id: Uuid,
    pub location_id: Uuid,
    pub external_id: Option<String>,
    pub name: String,
    pub equipment_type: String,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub is_connected: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EquipmentUnitEntity> for EquipmentUnit {
    fn from(entity: EquipmentUnitEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            provider_config_id: entity.provider_config_id,
            location_id: entity.location_id,
            external_id: entity.external_id,
            name: entity.name,
            equipment_type: EquipmentType::from_str(&entity.equipment_type)
                .unwrap_or(EquipmentType::Other),
            model: entity.model,
            serial_number: entity.serial_number,
            is_connected: entity.is_connected,
            last_seen_at: entity.last_seen_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the equipment_workouts table.
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentWorkoutEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub provider_config_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub external_id: Option<String>,
    pub equipment_type: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i32,
    pub calories: Option<i32>,
    pub distance_meters: Option<i32>,
    pub avg_heart_rate: Option<i32>,
    pub metrics: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<EquipmentWorkoutEntity> for EquipmentWorkout {
    fn from(entity: EquipmentWorkoutEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            provider_config_id: entity.provider_config_id,
            unit_id: entity.unit_id,
            external_id: entity.external_id,
            equipment_type: EquipmentType::from_str(&entity.equipment_type)
                .unwrap_or(EquipmentType::Other),
            started_at: entity.started_at,
            duration_seconds: entity.duration_seconds,
            calories: entity.calories,
            distance_meters: entity.distance_meters,
            avg_heart_rate: entity.avg_heart_rate,
            metrics: entity.metrics,
            created_at: entity.created_at,
        }
    }
}

/// Aggregate row for a member's equipment workouts.
#[derive(Debug, Clone, FromRow)]
pub struct WorkoutStatsEntity {
    pub total_workouts: i64,
    pub total_duration_seconds: i64,
    pub total_calories: i64,
    pub total_distance_meters: i64,
}

impl From<WorkoutStatsEntity> for WorkoutStats {
    fn from(entity: WorkoutStatsEntity) -> Self {
        WorkoutStats::new(
            entity.total_workouts,
            entity.total_duration_seconds,
            entity.total_calories,
            entity.total_distance_meters,
        )
    }
}
