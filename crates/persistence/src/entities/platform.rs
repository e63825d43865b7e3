//! Global setting and maintenance window entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::platform::{MaintenanceStatus, SettingValueType};
use domain::models::{GlobalSetting, MaintenanceWindow};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the global_settings table.
#[derive(Debug, Clone, FromRow)]
pub struct GlobalSettingEntity {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub value_type: String,
    pub category: String,
    pub description: Option<String>,
    pub is_editable: bool,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GlobalSettingEntity> for GlobalSetting {
    fn from(entity: GlobalSettingEntity) -> Self {
        Self {
            id: entity.id,
            key: entity.key,
            value: entity.value,
            value_type: SettingValueType::from_str(&entity.value_type)
                .unwrap_or(SettingValueType::String),
            category: entity.category,
            description: entity.description,
            is_editable: entity.is_editable,
            updated_by: entity.updated_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the maintenance_windows table.
#[derive(Debug, Clone, FromRow)]
pub struct MaintenanceWindowEntity {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MaintenanceWindowEntity> for MaintenanceWindow {
    fn from(entity: MaintenanceWindowEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            title: entity.title,
            message: entity.message,
            starts_at: entity.starts_at,
            ends_at: entity.ends_at,
            status: MaintenanceStatus::from_str(&entity.status)
                .unwrap_or(MaintenanceStatus::Cancelled),
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
