//! Location and attendance entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::attendance::CheckInMethod;
use domain::models::{AttendanceRecord, AttendanceStatus, Location};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the locations table.
#[derive(Debug, Clone, FromRow)]
pub struct LocationEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LocationEntity> for Location {
    fn from(entity: LocationEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            address: entity.address,
            capacity: entity.capacity,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the attendance_records table.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub location_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub status: String,
    pub check_in_method: String,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub checked_in_by: Option<Uuid>,
}

impl From<AttendanceEntity> for AttendanceRecord {
    fn from(entity: AttendanceEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            location_id: entity.location_id,
            subscription_id: entity.subscription_id,
            status: AttendanceStatus::from_str(&entity.status)
                .unwrap_or(AttendanceStatus::CheckedOut),
            check_in_method: CheckInMethod::from_str(&entity.check_in_method)
                .unwrap_or(CheckInMethod::Manual),
            check_in_time: entity.check_in_time,
            check_out_time: entity.check_out_time,
            checked_in_by: entity.checked_in_by,
        }
    }
}
