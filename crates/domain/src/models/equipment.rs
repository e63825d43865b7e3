//! Connected gym equipment: provider catalogue, per-tenant provider
//! configuration, units on the floor, and workouts reported by them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, DomainError};

db_enum! {
    pub enum AuthType {
        ApiKey => "API_KEY",
        OAuth2 => "OAUTH2",
        Basic => "BASIC",
        None => "NONE",
    }
}

db_enum! {
    pub enum ProviderConfigStatus {
        Pending => "PENDING",
        Active => "ACTIVE",
        Error => "ERROR",
        Disabled => "DISABLED",
    }
}

db_enum! {
    pub enum EquipmentType {
        Treadmill => "TREADMILL",
        Bike => "BIKE",
        Rower => "ROWER",
        Elliptical => "ELLIPTICAL",
        StairClimber => "STAIR_CLIMBER",
        Strength => "STRENGTH",
        Other => "OTHER",
    }
}

pub const DEFAULT_SYNC_INTERVAL_MINUTES: i32 = 60;

/// Global catalogue entry, shared by all tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentProvider {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub auth_type: AuthType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A tenant's credentials and sync settings for one provider.
///
/// Secrets are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentProviderConfig {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider_id: Uuid,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    #[serde(skip_serializing, default)]
    pub api_secret: Option<String>,
    #[serde(skip_serializing, default)]
    pub oauth_access_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub oauth_refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_token_expires_at: Option<DateTime<Utc>>,
    pub sync_enabled: bool,
    pub sync_interval_minutes: i32,
    pub settings: Value,
    pub status: ProviderConfigStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EquipmentProviderConfig {
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.oauth_access_token.is_some()
    }

    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.oauth_token_expires_at.map_or(false, |exp| exp <= now)
    }

    pub fn set_oauth_tokens(
        &mut self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.oauth_access_token = Some(access_token);
        if refresh_token.is_some() {
            self.oauth_refresh_token = refresh_token;
        }
        self.oauth_token_expires_at = expires_at;
        self.status = ProviderConfigStatus::Active;
        self.last_error = None;
    }

    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.last_sync_at = Some(now);
        self.status = ProviderConfigStatus::Active;
        self.last_error = None;
    }

    pub fn record_error(&mut self, error: String) {
        self.status = ProviderConfigStatus::Error;
        self.last_error = Some(error);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentUnit {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider_config_id: Uuid,
    pub location_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub name: String,
    pub equipment_type: EquipmentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EquipmentUnit {
    pub fn mark_connected(&mut self, now: DateTime<Utc>) {
        self.is_connected = true;
        self.last_seen_at = Some(now);
    }

    pub fn mark_disconnected(&mut self) {
        self.is_connected = false;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentWorkout {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub provider_config_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Uuid>,
    /// Provider's workout id; a repeated id is ignored on ingest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub equipment_type: EquipmentType,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<i32>,
    pub metrics: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStats {
    pub total_workouts: i64,
    pub total_duration_seconds: i64,
    pub total_duration_minutes: i64,
    pub total_calories: i64,
    pub total_distance_meters: i64,
}

impl WorkoutStats {
    pub fn new(
        total_workouts: i64,
        total_duration_seconds: i64,
        total_calories: i64,
        total_distance_meters: i64,
    ) -> Self {
        Self {
            total_workouts,
            total_duration_seconds,
            total_duration_minutes: total_duration_seconds / 60,
            total_calories,
            total_distance_meters,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderConfigRequest {
    pub provider_id: Uuid,
    #[validate(length(max = 500))]
    pub api_key: Option<String>,
    #[validate(length(max = 500))]
    pub api_secret: Option<String>,
    pub settings: Option<Value>,
    #[validate(range(min = 5, max = 1440, message = "Sync interval must be 5-1440 minutes"))]
    pub sync_interval_minutes: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProviderConfigRequest {
    #[validate(length(max = 500))]
    pub api_key: Option<String>,
    #[validate(length(max = 500))]
    pub api_secret: Option<String>,
    pub settings: Option<Value>,
    pub sync_enabled: Option<bool>,
    #[validate(range(min = 5, max = 1440, message = "Sync interval must be 5-1440 minutes"))]
    pub sync_interval_minutes: Option<i32>,
    pub status: Option<ProviderConfigStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OAuthTokensRequest {
    #[validate(length(min = 1, max = 4000, message = "Access token is required"))]
    pub access_token: String,
    #[validate(length(max = 4000))]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEquipmentUnitRequest {
    pub provider_config_id: Uuid,
    pub location_id: Uuid,
    #[validate(length(max = 100))]
    pub external_id: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub equipment_type: EquipmentType,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEquipmentUnitRequest {
    pub location_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    pub equipment_type: Option<EquipmentType>,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentUnitQuery {
    pub location_id: Option<Uuid>,
    pub equipment_type: Option<EquipmentType>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordWorkoutRequest {
    pub member_id: Uuid,
    pub provider_config_id: Uuid,
    pub unit_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub external_id: Option<String>,
    pub equipment_type: EquipmentType,
    pub started_at: DateTime<Utc>,
    #[validate(range(min = 0, max = 86400, message = "Duration must be 0-86400 seconds"))]
    pub duration_seconds: i32,
    #[validate(range(min = 0))]
    pub calories: Option<i32>,
    #[validate(range(min = 0))]
    pub distance_meters: Option<i32>,
    #[validate(range(min = 20, max = 250, message = "Heart rate must be 20-250 bpm"))]
    pub avg_heart_rate: Option<i32>,
    pub metrics: Option<Value>,
}

impl RecordWorkoutRequest {
    pub fn ensure_not_in_future(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_argument(self.started_at <= now, "Workout start must not be in the future")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> EquipmentProviderConfig {
        EquipmentProviderConfig {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            api_key: None,
            api_secret: None,
            oauth_access_token: None,
            oauth_refresh_token: Some("old-refresh".into()),
            oauth_token_expires_at: None,
            sync_enabled: true,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            settings: Value::Null,
            status: ProviderConfigStatus::Pending,
            last_sync_at: None,
            last_error: Some("401".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_oauth_tokens_activate_config() {
        let mut c = config();
        assert!(!c.has_credentials());
        let exp = Utc::now() + Duration::hours(1);
        c.set_oauth_tokens("access".into(), None, Some(exp));
        assert!(c.has_credentials());
        assert_eq!(c.oauth_refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(c.status, ProviderConfigStatus::Active);
        assert!(c.last_error.is_none());
        assert!(!c.is_token_expired(Utc::now()));
        assert!(c.is_token_expired(exp));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut c = config();
        c.api_key = Some("secret-key".into());
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(!json.contains("old-refresh"));
    }

    #[test]
    fn test_error_then_sync() {
        let mut c = config();
        c.record_error("timeout".into());
        assert_eq!(c.status, ProviderConfigStatus::Error);
        c.mark_synced(Utc::now());
        assert_eq!(c.status, ProviderConfigStatus::Active);
    }

    #[test]
    fn test_stats_minutes() {
        let stats = WorkoutStats::new(3, 5430, 900, 12000);
        assert_eq!(stats.total_duration_minutes, 90);
    }
}
