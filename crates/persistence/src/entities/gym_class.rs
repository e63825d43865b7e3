//! Gym class and class session entities (database row mappings).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domain::models::{ClassSession, ClassStatus, GymClass, SessionStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the gym_classes table.
#[derive(Debug, Clone, FromRow)]
pub struct GymClassEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trainer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub max_capacity: i32,
    pub duration_minutes: i32,
    pub waitlist_enabled: bool,
    pub max_waitlist_size: i32,
    pub deducts_class_from_plan: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GymClassEntity> for GymClass {
    fn from(entity: GymClassEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            description: entity.description,
            trainer_id: entity.trainer_id,
            location_id: entity.location_id,
            max_capacity: entity.max_capacity,
            duration_minutes: entity.duration_minutes,
            waitlist_enabled: entity.waitlist_enabled,
            max_waitlist_size: entity.max_waitlist_size,
            deducts_class_from_plan: entity.deducts_class_from_plan,
            status: ClassStatus::from_str(&entity.status).unwrap_or(ClassStatus::Inactive),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the class_sessions table.
#[derive(Debug, Clone, FromRow)]
pub struct ClassSessionEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub class_id: Uuid,
    pub trainer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub booked_count: i32,
    pub waitlist_count: i32,
    pub checked_in_count: i32,
    pub waitlist_enabled: bool,
    pub max_waitlist_size: i32,
    pub deducts_class_from_plan: bool,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClassSessionEntity> for ClassSession {
    fn from(entity: ClassSessionEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            class_id: entity.class_id,
            trainer_id: entity.trainer_id,
            location_id: entity.location_id,
            session_date: entity.session_date,
            start_time: entity.start_time,
            end_time: entity.end_time,
            capacity: entity.capacity,
            booked_count: entity.booked_count,
            waitlist_count: entity.waitlist_count,
            checked_in_count: entity.checked_in_count,
            waitlist_enabled: entity.waitlist_enabled,
            max_waitlist_size: entity.max_waitlist_size,
            deducts_class_from_plan: entity.deducts_class_from_plan,
            status: SessionStatus::from_str(&entity.status).unwrap_or(SessionStatus::Cancelled),
            cancellation_reason: entity.cancellation_reason,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
