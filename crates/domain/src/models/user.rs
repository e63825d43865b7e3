//! User accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

db_enum! {
    /// Role of a user. Platform administrators are not bound to a tenant.
    pub enum Role {
        PlatformAdmin => "PLATFORM_ADMIN",
        ClubAdmin => "CLUB_ADMIN",
        Staff => "STAFF",
        Trainer => "TRAINER",
        Member => "MEMBER",
    }
}

impl Role {
    /// Numeric rank used for "at least this role" checks.
    pub fn rank(&self) -> u8 {
        match self {
            Role::PlatformAdmin => 100,
            Role::ClubAdmin => 80,
            Role::Staff => 60,
            Role::Trainer => 40,
            Role::Member => 20,
        }
    }

    /// Returns true if this role has at least the privileges of `required`.
    pub fn has_at_least(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn is_tenant_scoped(&self) -> bool {
        *self != Role::PlatformAdmin
    }
}

/// A login account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Club slug; omitted by platform administrators.
    pub tenant_slug: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,

    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::PlatformAdmin.has_at_least(Role::ClubAdmin));
        assert!(Role::ClubAdmin.has_at_least(Role::Staff));
        assert!(Role::Staff.has_at_least(Role::Trainer));
        assert!(Role::Staff.has_at_least(Role::Staff));
        assert!(!Role::Trainer.has_at_least(Role::Staff));
        assert!(!Role::Member.has_at_least(Role::Trainer));
    }

    #[test]
    fn test_tenant_scope() {
        assert!(!Role::PlatformAdmin.is_tenant_scoped());
        assert!(Role::Member.is_tenant_scoped());
    }

    #[test]
    fn test_role_serde_matches_db_text() {
        for role in Role::ALL {
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
    }

    #[test]
    fn test_create_user_validation() {
        let request = CreateUserRequest {
            email: "not-an-email".into(),
            password: "short".into(),
            display_name: String::new(),
            role: Role::Staff,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("display_name"));
    }
}
