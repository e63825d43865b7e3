//! Class pack and balance entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{ClassPack, ClassPackBalance, ClassPackBalanceStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the class_packs table.
#[derive(Debug, Clone, FromRow)]
pub struct ClassPackEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub class_count: i32,
    pub price: i64,
    pub validity_days: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClassPackEntity> for ClassPack {
    fn from(entity: ClassPackEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            description: entity.description,
            class_count: entity.class_count,
            price: entity.price,
            validity_days: entity.validity_days,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the class_pack_balances table.
#[derive(Debug, Clone, FromRow)]
pub struct ClassPackBalanceEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub class_pack_id: Uuid,
    pub classes_total: i32,
    pub classes_remaining: i32,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClassPackBalanceEntity> for ClassPackBalance {
    fn from(entity: ClassPackBalanceEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            class_pack_id: entity.class_pack_id,
            classes_total: entity.classes_total,
            classes_remaining: entity.classes_remaining,
            status: ClassPackBalanceStatus::from_str(&entity.status)
                .unwrap_or(ClassPackBalanceStatus::Cancelled),
            expires_at: entity.expires_at,
            granted_at: entity.granted_at,
            updated_at: entity.updated_at,
        }
    }
}
