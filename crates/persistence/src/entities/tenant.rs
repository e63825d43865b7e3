//! Tenant entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Tenant, TenantStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the tenants table.
#[derive(Debug, Clone, FromRow)]
pub struct TenantEntity {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: String,
    pub contact_email: Option<String>,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TenantEntity> for Tenant {
    fn from(entity: TenantEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            slug: entity.slug,
            status: TenantStatus::from_str(&entity.status).unwrap_or(TenantStatus::Suspended),
            contact_email: entity.contact_email,
            timezone: entity.timezone,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
