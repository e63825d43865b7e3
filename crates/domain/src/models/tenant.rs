//! Tenant (club/organization) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    /// Lifecycle of a tenant account.
    pub enum TenantStatus {
        Active => "ACTIVE",
        Suspended => "SUSPENDED",
    }
}

/// A club or organization whose data is isolated from every other tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn suspend(&mut self) -> Result<(), DomainError> {
        ensure_state(self.is_active(), "Tenant is already suspended")?;
        self.status = TenantStatus::Suspended;
        Ok(())
    }

    pub fn reactivate(&mut self) -> Result<(), DomainError> {
        ensure_state(!self.is_active(), "Tenant is already active")?;
        self.status = TenantStatus::Active;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_slug"))]
    pub slug: String,

    #[validate(email(message = "Invalid contact email"))]
    pub contact_email: Option<String>,

    #[validate(length(min = 1, max = 64, message = "Timezone must be 1-64 characters"))]
    pub timezone: Option<String>,

    /// First club administrator, created together with the tenant.
    #[validate(nested)]
    pub admin: Option<TenantAdminRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TenantAdminRequest {
    #[validate(email(message = "Invalid admin email"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid contact email"))]
    pub contact_email: Option<String>,

    #[validate(length(min = 1, max = 64, message = "Timezone must be 1-64 characters"))]
    pub timezone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            name: "Iron Gym".into(),
            slug: "iron-gym".into(),
            status: TenantStatus::Active,
            contact_email: None,
            timezone: "Asia/Riyadh".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_suspend_and_reactivate() {
        let mut t = tenant();
        t.suspend().unwrap();
        assert_eq!(t.status, TenantStatus::Suspended);
        assert!(t.suspend().is_err());
        t.reactivate().unwrap();
        assert!(t.is_active());
        assert!(t.reactivate().is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("active".parse::<TenantStatus>().unwrap(), TenantStatus::Active);
        assert_eq!(TenantStatus::Suspended.to_string(), "SUSPENDED");
        assert!("closed".parse::<TenantStatus>().is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreateTenantRequest {
            name: "Iron Gym".into(),
            slug: "Iron Gym".into(),
            contact_email: None,
            timezone: None,
            admin: None,
        };
        assert!(request.validate().is_err());

        let request = CreateTenantRequest {
            slug: "iron-gym".into(),
            ..request
        };
        assert!(request.validate().is_ok());
    }
}
