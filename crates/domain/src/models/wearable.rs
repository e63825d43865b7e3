//! Member wearable connections and the data they sync.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum ConnectionStatus {
        Connected => "CONNECTED",
        Disconnected => "DISCONNECTED",
    }
}

db_enum! {
    pub enum SyncStatus {
        Pending => "PENDING",
        Success => "SUCCESS",
        Failed => "FAILED",
    }
}

pub const ACTIVITY_STATS_DAYS: i64 = 30;

/// Global catalogue entry (Garmin, Fitbit, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WearablePlatform {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WearableConnection {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub platform_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_username: Option<String>,
    #[serde(skip_serializing, default)]
    pub access_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: ConnectionStatus,
    pub sync_enabled: bool,
    pub sync_status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WearableConnection {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn update_tokens(
        &mut self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.access_token = Some(access_token);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.token_expires_at = expires_at;
        self.status = ConnectionStatus::Connected;
    }

    /// Drops tokens and stops syncing.
    pub fn disconnect(&mut self) -> Result<(), DomainError> {
        ensure_state(self.is_connected(), "Connection is already disconnected")?;
        self.status = ConnectionStatus::Disconnected;
        self.access_token = None;
        self.refresh_token = None;
        self.token_expires_at = None;
        self.sync_enabled = false;
        Ok(())
    }

    pub fn ensure_syncable(&self) -> Result<(), DomainError> {
        ensure_state(self.is_connected(), "Connection is disconnected")?;
        ensure_state(self.sync_enabled, "Sync is disabled for this connection")
    }

    pub fn record_sync_result(&mut self, error: Option<String>, now: DateTime<Utc>) {
        self.last_sync_at = Some(now);
        self.sync_status = if error.is_some() {
            SyncStatus::Failed
        } else {
            SyncStatus::Success
        };
        self.last_sync_error = error;
    }
}

/// One row per connection and day; re-syncing a day replaces its numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WearableDailyActivity {
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
    pub raw_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WearableWorkout {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub connection_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub activity_type: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<i32>,
    pub raw_data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WearableWorkoutStats {
    pub total_workouts: i64,
    pub total_duration_seconds: i64,
    pub total_duration_minutes: i64,
    pub total_calories: i64,
}

impl WearableWorkoutStats {
    pub fn new(total_workouts: i64, total_duration_seconds: i64, total_calories: i64) -> Self {
        Self {
            total_workouts,
            total_duration_seconds,
            total_duration_minutes: total_duration_seconds / 60,
            total_calories,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WearableActivityStats {
    pub days_tracked: usize,
    pub total_steps: i64,
    pub average_steps_per_day: f64,
    pub total_calories: i64,
    pub total_active_minutes: i64,
    pub average_sleep_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_resting_heart_rate: Option<i32>,
}

impl WearableActivityStats {
    /// Aggregates the given days; averages skip days without a value.
    pub fn from_days(days: &[WearableDailyActivity]) -> Self {
        if days.is_empty() {
            return Self::default();
        }
        let sum = |f: fn(&WearableDailyActivity) -> Option<i32>| -> i64 {
            days.iter().filter_map(f).map(i64::from).sum()
        };
        let count = |f: fn(&WearableDailyActivity) -> Option<i32>| -> i64 {
            days.iter().filter_map(f).count() as i64
        };

        let total_steps = sum(|d| d.steps);
        let step_days = count(|d| d.steps);
        let sleep_days = count(|d| d.sleep_minutes);
        let hr_days = count(|d| d.resting_heart_rate);

        Self {
            days_tracked: days.len(),
            total_steps,
            average_steps_per_day: if step_days > 0 {
                total_steps as f64 / step_days as f64
            } else {
                0.0
            },
            total_calories: sum(|d| d.calories_total),
            total_active_minutes: sum(|d| d.active_minutes),
            average_sleep_minutes: if sleep_days > 0 {
                sum(|d| d.sleep_minutes) / sleep_days
            } else {
                0
            },
            average_resting_heart_rate: (hr_days > 0)
                .then(|| (sum(|d| d.resting_heart_rate) / hr_days) as i32),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    pub member_id: Uuid,
    pub platform_id: Uuid,
    #[validate(length(max = 100))]
    pub external_user_id: Option<String>,
    #[validate(length(max = 100))]
    pub external_username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConnectionRequest {
    #[validate(length(max = 100))]
    pub external_user_id: Option<String>,
    #[validate(length(max = 100))]
    pub external_username: Option<String>,
    pub sync_enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTokensRequest {
    #[validate(length(min = 1, max = 4000, message = "Access token is required"))]
    pub access_token: String,
    #[validate(length(max = 4000))]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivityRequest {
    pub connection_id: Uuid,
    pub activity_date: NaiveDate,
    #[validate(range(min = 0, max = 200000))]
    pub steps: Option<i32>,
    #[validate(range(min = 0))]
    pub distance_meters: Option<i32>,
    #[validate(range(min = 0, max = 20000))]
    pub calories_total: Option<i32>,
    #[validate(range(min = 0, max = 1440))]
    pub active_minutes: Option<i32>,
    #[validate(range(min = 0, max = 1440))]
    pub sleep_minutes: Option<i32>,
    #[validate(range(min = 20, max = 250, message = "Heart rate must be 20-250 bpm"))]
    pub resting_heart_rate: Option<i32>,
    pub raw_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WearableWorkoutRequest {
    pub connection_id: Uuid,
    #[validate(length(max = 100))]
    pub external_id: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Activity type must be 1-50 characters"))]
    pub activity_type: String,
    pub started_at: DateTime<Utc>,
    #[validate(range(min = 0, max = 172800))]
    pub duration_seconds: i32,
    #[validate(range(min = 0))]
    pub distance_meters: Option<i32>,
    #[validate(range(min = 0))]
    pub calories: Option<i32>,
    #[validate(range(min = 20, max = 250, message = "Heart rate must be 20-250 bpm"))]
    pub avg_heart_rate: Option<i32>,
    pub raw_data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> WearableConnection {
        WearableConnection {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            platform_id: Uuid::new_v4(),
            external_user_id: None,
            external_username: None,
            access_token: Some("tok".into()),
            refresh_token: Some("ref".into()),
            token_expires_at: None,
            status: ConnectionStatus::Connected,
            sync_enabled: true,
            sync_status: SyncStatus::Pending,
            last_sync_at: None,
            last_sync_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(steps: Option<i32>, sleep: Option<i32>, hr: Option<i32>) -> WearableDailyActivity {
        WearableDailyActivity {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            member_id: Uuid::nil(),
            connection_id: Uuid::nil(),
            activity_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            steps,
            distance_meters: None,
            calories_total: Some(2000),
            active_minutes: Some(30),
            sleep_minutes: sleep,
            resting_heart_rate: hr,
            raw_data: Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_disconnect_clears_tokens() {
        let mut c = connection();
        c.disconnect().unwrap();
        assert!(c.access_token.is_none());
        assert!(!c.sync_enabled);
        assert!(c.disconnect().is_err());
        assert!(c.ensure_syncable().is_err());

        c.update_tokens("new".into(), None, None);
        assert!(c.is_connected());
    }

    #[test]
    fn test_sync_result() {
        let mut c = connection();
        c.record_sync_result(Some("rate limited".into()), Utc::now());
        assert_eq!(c.sync_status, SyncStatus::Failed);
        c.record_sync_result(None, Utc::now());
        assert_eq!(c.sync_status, SyncStatus::Success);
        assert!(c.last_sync_error.is_none());
    }

    #[test]
    fn test_activity_stats() {
        let stats = WearableActivityStats::from_days(&[
            day(Some(10000), Some(420), Some(60)),
            day(Some(6000), None, Some(64)),
            day(None, Some(480), None),
        ]);
        assert_eq!(stats.days_tracked, 3);
        assert_eq!(stats.total_steps, 16000);
        assert_eq!(stats.average_steps_per_day, 8000.0);
        assert_eq!(stats.total_calories, 6000);
        assert_eq!(stats.average_sleep_minutes, 450);
        assert_eq!(stats.average_resting_heart_rate, Some(62));
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(WearableActivityStats::from_days(&[]), WearableActivityStats::default());
    }
}
