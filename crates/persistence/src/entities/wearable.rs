//! Wearable integration entities (database row mappings).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::wearable::{
    ConnectionStatus, SyncStatus, WearableDailyActivity, WearableWorkout, WearableWorkoutStats,
};
use domain::models::{WearableConnection, WearablePlatform};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the wearable_platforms table.
#[derive(Debug, Clone, FromRow)]
pub struct WearablePlatformEntity {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WearablePlatformEntity> for WearablePlatform {
    fn from(entity: WearablePlatformEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            name: entity.name,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the wearable_connections table.
#[derive(Debug, Clone, FromRow)]
pub struct WearableConnectionEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub platform_id: Uuid,
    pub external_user_id: Option<String>,
    pub external_username: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: String,
    pub sync_enabled: bool,
    pub sync_status: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WearableConnectionEntity> for WearableConnection {
    fn from(entity: WearableConnectionEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            platform_id: entity.platform_id,
            external_user_id: entity.external_user_id,
            external_username: entity.external_username,
            access_token: entity.access_token,
            refresh_token: entity.refresh_token,
            token_expires_at: entity.token_expires_at,
            status: ConnectionStatus::from_str(&entity.status)
                .unwrap_or(ConnectionStatus::Disconnected),
            sync_enabled: entity.sync_enabled,
            sync_status: SyncStatus::from_str(&entity.sync_status).unwrap_or(SyncStatus::Pending),
            last_sync_at: entity.last_sync_at,
            last_sync_error: entity.last_sync_error,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the wearable_daily_activities table.
#[derive(Debug, Clone, FromRow)]
pub struct WearableDailyActivityEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub connection_id: Uuid,
    pub activity_date: NaiveDate,
    pub steps: Option<i32>,
    pub distance_meters: Option<i32>,
    pub calories_total: Option<i32>,
    pub active_minutes: Option<i32>,
    pub sleep_minutes: Option<i32>,
    pub resting_heart_rate: Option<i32>,
    pub raw_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WearableDailyActivityEntity> for WearableDailyActivity {
    fn from(entity: WearableDailyActivityEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            connection_id: entity.connection_id,
            activity_date: entity.activity_date,
            steps: entity.steps,
            distance_meters: entity.distance_meters,
            calories_total: entity.calories_total,
            active_minutes: entity.active_minutes,
            sleep_minutes: entity.sleep_minutes,
            resting_heart_rate: entity.resting_heart_rate,
            raw_data: entity.raw_data,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the wearable_workouts table.
#[derive(Debug, Clone, FromRow)]
pub struct WearableWorkoutEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub connection_id: Uuid,
    pub external_id: Option<String>,
    pub activity_type: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i32,
    pub distance_meters: Option<i32>,
    pub calories: Option<i32>,
    pub avg_heart_rate: Option<i32>,
    pub raw_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<WearableWorkoutEntity> for WearableWorkout {
    fn from(entity: WearableWorkoutEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            connection_id: entity.connection_id,
            external_id: entity.external_id,
            activity_type: entity.activity_type,
            started_at: entity.started_at,
            duration_seconds: entity.duration_seconds,
            distance_meters: entity.distance_meters,
            calories: entity.calories,
            avg_heart_rate: entity.avg_heart_rate,
            raw_data: entity.raw_data,
            created_at: entity.created_at,
        }
    }
}

/// Aggregate row for a member's wearable workouts.
#[derive(Debug, Clone, FromRow)]
pub struct WearableWorkoutStatsEntity {
    pub total_workouts: i64,
    pub total_duration_seconds: i64,
    pub total_calories: i64,
}

impl From<WearableWorkoutStatsEntity> for WearableWorkoutStats {
    fn from(entity: WearableWorkoutStatsEntity) -> Self {
        WearableWorkoutStats::new(
            entity.total_workouts,
            entity.total_duration_seconds,
            entity.total_calories,
        )
    }
}
