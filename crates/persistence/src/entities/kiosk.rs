//! Kiosk device and session entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::kiosk::{IdentificationMethod, KioskSessionStatus, KioskStatus};
use domain::models::{KioskDevice, KioskSession};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the kiosk_devices table.
#[derive(Debug, Clone, FromRow)]
pub struct KioskDeviceEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub code: String,
    pub name: String,
    pub status: String,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<KioskDeviceEntity> for KioskDevice {
    fn from(entity: KioskDeviceEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            location_id: entity.location_id,
            code: entity.code,
            name: entity.name,
            status: KioskStatus::from_str(&entity.status).unwrap_or(KioskStatus::Inactive),
            last_heartbeat_at: entity.last_heartbeat_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the kiosk_sessions table.
#[derive(Debug, Clone, FromRow)]
pub struct KioskSessionEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub device_id: Uuid,
    pub member_id: Option<Uuid>,
    pub identification_method: Option<String>,
    pub status: String,
    pub attendance_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<KioskSessionEntity> for KioskSession {
    fn from(entity: KioskSessionEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            device_id: entity.device_id,
            member_id: entity.member_id,
            identification_method: entity
                .identification_method
                .as_deref()
                .and_then(|m| IdentificationMethod::from_str(m).ok()),
            status: KioskSessionStatus::from_str(&entity.status)
                .unwrap_or(KioskSessionStatus::Expired),
            attendance_id: entity.attendance_id,
            started_at: entity.started_at,
            last_activity_at: entity.last_activity_at,
            ended_at: entity.ended_at,
        }
    }
}
