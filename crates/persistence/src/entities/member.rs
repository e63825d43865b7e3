//! Member entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::member::Gender;
use domain::models::{Member, MemberStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the members table.
#[derive(Debug, Clone, FromRow)]
pub struct MemberEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MemberEntity> for Member {
    fn from(entity: MemberEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            user_id: entity.user_id,
            first_name: entity.first_name,
            last_name: entity.last_name,
            email: entity.email,
            phone: entity.phone,
            date_of_birth: entity.date_of_birth,
            gender: Gender::from_str(&entity.gender).unwrap_or(Gender::Unspecified),
            status: MemberStatus::from_str(&entity.status).unwrap_or(MemberStatus::Pending),
            notes: entity.notes,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Row of `SELECT status, COUNT(*)` aggregations.
#[derive(Debug, Clone, FromRow)]
pub struct StatusCountEntity {
    pub status: String,
    pub count: i64,
}
