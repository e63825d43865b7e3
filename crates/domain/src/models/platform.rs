//! Platform-wide settings and maintenance windows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum SettingValueType {
        String => "STRING",
        Number => "NUMBER",
        Boolean => "BOOLEAN",
        Json => "JSON",
    }
}

impl SettingValueType {
    /// Checks that `value` parses as this type.
    pub fn check(&self, value: &str) -> Result<(), DomainError> {
        let ok = match self {
            SettingValueType::String => true,
            SettingValueType::Number => value.trim().parse::<f64>().map_or(false, f64::is_finite),
            SettingValueType::Boolean => matches!(value, "true" | "false"),
            SettingValueType::Json => serde_json::from_str::<serde_json::Value>(value).is_ok(),
        };
        ensure_argument(ok, format!("Value is not a valid {}", self))
    }
}

db_enum! {
    pub enum MaintenanceStatus {
        Scheduled => "SCHEDULED",
        Cancelled => "CANCELLED",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSetting {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub value_type: SettingValueType,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_editable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GlobalSetting {
    pub fn update_value(&mut self, value: String, by: Uuid) -> Result<(), DomainError> {
        ensure_state(
            self.is_editable,
            format!("Setting {} is not editable", self.key),
        )?;
        self.value_type.check(&value)?;
        self.value = value;
        self.updated_by = Some(by);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    pub id: Uuid,
    /// `None` affects every tenant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: MaintenanceStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceWindow {
    pub fn validate_period(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_argument(ends_at > starts_at, "Maintenance end must be after start")
    }

    pub fn affects_all_tenants(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Scheduled and `now` within `[starts_at, ends_at)`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == MaintenanceStatus::Scheduled && self.starts_at <= now && now < self.ends_at
    }

    pub fn applies_to(&self, tenant_id: Option<Uuid>) -> bool {
        self.affects_all_tenants() || (tenant_id.is_some() && self.tenant_id == tenant_id)
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status == MaintenanceStatus::Scheduled,
            "Maintenance window is already cancelled",
        )?;
        self.status = MaintenanceStatus::Cancelled;
        Ok(())
    }

    pub fn reschedule(
        &mut self,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        ensure_state(
            self.status == MaintenanceStatus::Scheduled,
            "Cannot change a cancelled maintenance window",
        )?;
        Self::validate_period(starts_at, ends_at)?;
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSettingRequest {
    #[validate(length(min = 1, max = 100, message = "Key must be 1-100 characters"))]
    pub key: String,
    #[validate(length(max = 10000))]
    pub value: String,
    pub value_type: SettingValueType,
    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    pub category: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default = "default_editable")]
    pub is_editable: bool,
}

fn default_editable() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingRequest {
    #[validate(length(max = 10000))]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingQuery {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaintenanceWindowRequest {
    pub tenant_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaintenanceWindowRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setting(value_type: SettingValueType, editable: bool) -> GlobalSetting {
        GlobalSetting {
            id: Uuid::new_v4(),
            key: "billing.vat_rate".into(),
            value: "15".into(),
            value_type,
            category: "billing".into(),
            description: None,
            is_editable: editable,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn window(start_offset_h: i64, len_h: i64) -> MaintenanceWindow {
        let now = Utc::now();
        MaintenanceWindow {
            id: Uuid::new_v4(),
            tenant_id: None,
            title: "Upgrade".into(),
            message: "Back soon".into(),
            starts_at: now + Duration::hours(start_offset_h),
            ends_at: now + Duration::hours(start_offset_h + len_h),
            status: MaintenanceStatus::Scheduled,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_value_types() {
        assert!(SettingValueType::Number.check("12.5").is_ok());
        assert!(SettingValueType::Number.check("twelve").is_err());
        assert!(SettingValueType::Number.check("NaN").is_err());
        assert!(SettingValueType::Boolean.check("true").is_ok());
        assert!(SettingValueType::Boolean.check("yes").is_err());
        assert!(SettingValueType::Json.check(r#"{"a":1}"#).is_ok());
        assert!(SettingValueType::Json.check("{a:1}").is_err());
        assert!(SettingValueType::String.check("anything").is_ok());
    }

    #[test]
    fn test_update_respects_editable_and_type() {
        let mut s = setting(SettingValueType::Number, true);
        s.update_value("5".into(), Uuid::new_v4()).unwrap();
        assert_eq!(s.value, "5");
        assert!(matches!(
            s.update_value("five".into(), Uuid::new_v4()),
            Err(DomainError::InvalidArgument(_))
        ));

        let mut locked = setting(SettingValueType::Number, false);
        assert!(matches!(
            locked.update_value("5".into(), Uuid::new_v4()),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn test_window_activity() {
        let now = Utc::now();
        let active = window(-1, 2);
        assert!(active.is_active(now));
        assert!(!window(1, 2).is_active(now));
        assert!(!window(-3, 1).is_active(now));

        let mut cancelled = window(-1, 2);
        cancelled.cancel().unwrap();
        assert!(!cancelled.is_active(now));
        assert!(cancelled.cancel().is_err());
    }

    #[test]
    fn test_window_end_is_exclusive() {
        let w = window(-2, 1);
        assert!(w.is_active(w.starts_at));
        assert!(!w.is_active(w.ends_at));
    }

    #[test]
    fn test_window_scope() {
        let tenant = Uuid::new_v4();
        let global = window(0, 1);
        assert!(global.applies_to(Some(tenant)));
        assert!(global.applies_to(None));

        let scoped = MaintenanceWindow {
            tenant_id: Some(tenant),
            ..window(0, 1)
        };
        assert!(scoped.applies_to(Some(tenant)));
        assert!(!scoped.applies_to(Some(Uuid::new_v4())));
        assert!(!scoped.applies_to(None));
    }

    #[test]
    fn test_period_validation() {
        let now = Utc::now();
        assert!(MaintenanceWindow::validate_period(now, now).is_err());
        let mut w = window(1, 1);
        assert!(w.reschedule(now + Duration::hours(2), now + Duration::hours(1)).is_err());
    }
}
