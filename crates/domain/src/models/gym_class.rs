//! Class definition (the template that sessions are scheduled from).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum ClassStatus {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Archived => "ARCHIVED",
    }
}

pub const DEFAULT_MAX_CAPACITY: i32 = 20;
pub const DEFAULT_DURATION_MINUTES: i32 = 60;
pub const DEFAULT_MAX_WAITLIST_SIZE: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymClass {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    pub max_capacity: i32,
    pub duration_minutes: i32,
    pub waitlist_enabled: bool,
    pub max_waitlist_size: i32,
    pub deducts_class_from_plan: bool,
    pub status: ClassStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GymClass {
    pub fn is_active(&self) -> bool {
        self.status == ClassStatus::Active
    }

    pub fn activate(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status != ClassStatus::Archived,
            "Cannot activate an archived class",
        )?;
        ensure_state(self.status != ClassStatus::Active, "Class is already active")?;
        self.status = ClassStatus::Active;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status == ClassStatus::Active,
            format!("Cannot deactivate class in status {}", self.status),
        )?;
        self.status = ClassStatus::Inactive;
        Ok(())
    }

    pub fn archive(&mut self) -> Result<(), DomainError> {
        ensure_state(self.status != ClassStatus::Archived, "Class is already archived")?;
        self.status = ClassStatus::Archived;
        Ok(())
    }

    pub fn update_capacity(&mut self, capacity: i32) -> Result<(), DomainError> {
        ensure_argument(capacity > 0, "Capacity must be positive")?;
        self.max_capacity = capacity;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub trainer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,

    #[validate(range(min = 1, max = 500, message = "Capacity must be 1-500"))]
    pub max_capacity: Option<i32>,

    #[validate(range(min = 5, max = 480, message = "Duration must be 5-480 minutes"))]
    pub duration_minutes: Option<i32>,

    pub waitlist_enabled: Option<bool>,

    #[validate(range(min = 0, max = 100, message = "Waitlist size must be 0-100"))]
    pub max_waitlist_size: Option<i32>,

    pub deducts_class_from_plan: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub trainer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,

    pub max_capacity: Option<i32>,

    #[validate(range(min = 5, max = 480, message = "Duration must be 5-480 minutes"))]
    pub duration_minutes: Option<i32>,

    pub waitlist_enabled: Option<bool>,

    #[validate(range(min = 0, max = 100, message = "Waitlist size must be 0-100"))]
    pub max_waitlist_size: Option<i32>,

    pub deducts_class_from_plan: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn class(status: ClassStatus) -> GymClass {
        GymClass {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Spin".into(),
            description: None,
            trainer_id: None,
            location_id: None,
            max_capacity: DEFAULT_MAX_CAPACITY,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            waitlist_enabled: true,
            max_waitlist_size: DEFAULT_MAX_WAITLIST_SIZE,
            deducts_class_from_plan: true,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_archived_class_cannot_be_activated() {
        let mut c = class(ClassStatus::Archived);
        assert_eq!(
            c.activate(),
            Err(DomainError::state("Cannot activate an archived class"))
        );
    }

    #[test]
    fn test_deactivate_requires_active() {
        let mut c = class(ClassStatus::Active);
        c.deactivate().unwrap();
        assert_eq!(c.status, ClassStatus::Inactive);
        assert!(c.deactivate().is_err());
        c.activate().unwrap();
        assert!(c.is_active());
    }

    #[test]
    fn test_archive() {
        let mut c = class(ClassStatus::Inactive);
        c.archive().unwrap();
        assert!(c.archive().is_err());
    }

    #[test]
    fn test_capacity_must_be_positive() {
        let mut c = class(ClassStatus::Active);
        assert!(c.update_capacity(0).is_err());
        assert!(c.update_capacity(-3).is_err());
        c.update_capacity(12).unwrap();
        assert_eq!(c.max_capacity, 12);
    }
}
