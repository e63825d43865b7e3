//! Club member domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum MemberStatus {
        Pending => "PENDING",
        Active => "ACTIVE",
        Suspended => "SUSPENDED",
        Frozen => "FROZEN",
        Cancelled => "CANCELLED",
    }
}

db_enum! {
    pub enum Gender {
        Male => "MALE",
        Female => "FEMALE",
        Unspecified => "UNSPECIFIED",
    }
}

/// Bulk-capable status actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberAction {
    Activate,
    Suspend,
    Freeze,
    Unfreeze,
    Cancel,
}

/// A person enrolled at a club.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    pub status: MemberStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn activate(&mut self) -> Result<(), DomainError> {
        ensure_state(
            matches!(
                self.status,
                MemberStatus::Pending | MemberStatus::Suspended | MemberStatus::Frozen
            ),
            format!("Cannot activate member in status {}", self.status),
        )?;
        self.status = MemberStatus::Active;
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.is_active(),
            format!("Cannot suspend member in status {}", self.status),
        )?;
        self.status = MemberStatus::Suspended;
        Ok(())
    }

    pub fn freeze(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.is_active(),
            format!("Cannot freeze member in status {}", self.status),
        )?;
        self.status = MemberStatus::Frozen;
        Ok(())
    }

    pub fn unfreeze(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status == MemberStatus::Frozen,
            format!("Cannot unfreeze member in status {}", self.status),
        )?;
        self.status = MemberStatus::Active;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status != MemberStatus::Cancelled,
            "Member is already cancelled",
        )?;
        self.status = MemberStatus::Cancelled;
        Ok(())
    }

    /// Applies a bulk action.
    pub fn apply(&mut self, action: MemberAction) -> Result<(), DomainError> {
        match action {
            MemberAction::Activate => self.activate(),
            MemberAction::Suspend => self.suspend(),
            MemberAction::Freeze => self.freeze(),
            MemberAction::Unfreeze => self.unfreeze(),
            MemberAction::Cancel => self.cancel(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: Option<String>,

    #[validate(custom(function = "shared::validation::validate_date_of_birth"))]
    pub date_of_birth: Option<NaiveDate>,

    pub gender: Option<Gender>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,

    /// Start as ACTIVE instead of PENDING.
    #[serde(default)]
    pub activate: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: Option<String>,

    #[validate(custom(function = "shared::validation::validate_date_of_birth"))]
    pub date_of_birth: Option<NaiveDate>,

    pub gender: Option<Gender>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkMemberActionRequest {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 member ids are required"))]
    pub member_ids: Vec<Uuid>,
    pub action: MemberAction,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberQuery {
    pub search: Option<String>,
    pub status: Option<MemberStatus>,
}

/// Member counts per status.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCounts {
    pub total: i64,
    pub pending: i64,
    pub active: i64,
    pub suspended: i64,
    pub frozen: i64,
    pub cancelled: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn member(status: MemberStatus) -> Member {
        Member {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: None,
            first_name: "Sara".into(),
            last_name: "Ali".into(),
            email: "sara@example.com".into(),
            phone: None,
            date_of_birth: None,
            gender: Gender::Female,
            status,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_activate_from_pending_suspended_frozen() {
        for status in [MemberStatus::Pending, MemberStatus::Suspended, MemberStatus::Frozen] {
            let mut m = member(status);
            m.activate().unwrap();
            assert!(m.is_active());
        }
        assert!(member(MemberStatus::Active).activate().is_err());
        assert!(member(MemberStatus::Cancelled).activate().is_err());
    }

    #[test]
    fn test_freeze_cycle() {
        let mut m = member(MemberStatus::Active);
        m.freeze().unwrap();
        assert_eq!(m.status, MemberStatus::Frozen);
        assert!(m.suspend().is_err());
        m.unfreeze().unwrap();
        assert!(m.is_active());
        assert!(m.unfreeze().is_err());
    }

    #[test]
    fn test_cancel_once() {
        let mut m = member(MemberStatus::Suspended);
        m.cancel().unwrap();
        assert_eq!(m.status, MemberStatus::Cancelled);
        let err = m.cancel().unwrap_err();
        assert_eq!(err.to_string(), "Member is already cancelled");
    }

    #[test]
    fn test_apply_dispatches() {
        let mut m = member(MemberStatus::Active);
        m.apply(MemberAction::Suspend).unwrap();
        assert_eq!(m.status, MemberStatus::Suspended);
        assert!(m.apply(MemberAction::Freeze).is_err());
    }

    #[test]
    fn test_full_name() {
        assert_eq!(member(MemberStatus::Active).full_name(), "Sara Ali");
    }

    #[test]
    fn test_create_request_validation() {
        let json = serde_json::json!({
            "firstName": "Omar",
            "lastName": "Hassan",
            "email": "omar@example.com",
            "phone": "+966501234567"
        });
        let request: CreateMemberRequest = serde_json::from_value(json).unwrap();
        assert!(request.validate().is_ok());
        assert!(!request.activate);

        let bad = CreateMemberRequest {
            phone: Some("12".into()),
            ..request
        };
        assert!(bad.validate().is_err());
    }
}
