//! User account entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Role, User};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            email: entity.email,
            display_name: entity.display_name,
            // Unknown roles get the least privileged one
            role: Role::from_str(&entity.role).unwrap_or(Role::Member),
            is_active: entity.is_active,
            last_login_at: entity.last_login_at,
            created_at: entity.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_role_maps_to_member() {
        let entity = UserEntity {
            id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            email: "coach@club.test".into(),
            password_hash: "hash".into(),
            display_name: "Coach".into(),
            role: "OWNER".into(),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(User::from(entity).role, Role::Member);
    }
}
