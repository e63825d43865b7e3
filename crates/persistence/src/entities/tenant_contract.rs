//! Tenant (platform) contract entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{TenantContract, TenantContractStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the tenant_contracts table.
#[derive(Debug, Clone, FromRow)]
pub struct TenantContractEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub contract_number: String,
    pub title: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_fee: i64,
    pub currency: String,
    pub terms: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by: Option<String>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub termination_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TenantContractEntity> for TenantContract {
    fn from(entity: TenantContractEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            contract_number: entity.contract_number,
            title: entity.title,
            status: TenantContractStatus::from_str(&entity.status)
                .unwrap_or(TenantContractStatus::Terminated),
            start_date: entity.start_date,
            end_date: entity.end_date,
            monthly_fee: entity.monthly_fee,
            currency: entity.currency.trim().to_string(),
            terms: entity.terms,
            sent_at: entity.sent_at,
            signed_at: entity.signed_at,
            signed_by: entity.signed_by,
            terminated_at: entity.terminated_at,
            termination_reason: entity.termination_reason,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
