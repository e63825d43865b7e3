//! Membership contract entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::contract::TerminationFeeType;
use domain::models::{ContractStatus, MembershipContract};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the membership_contracts table.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipContractEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub contract_number: String,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub status: String,
    pub start_date: NaiveDate,
    pub commitment_months: i32,
    pub commitment_end_date: Option<NaiveDate>,
    pub notice_period_days: i32,
    pub cooling_off_days: i32,
    pub monthly_fee: i64,
    pub termination_fee_type: String,
    pub termination_fee_value: Option<i64>,
    pub signed_at: Option<DateTime<Utc>>,
    pub cancellation_requested_at: Option<NaiveDate>,
    pub cancellation_effective_date: Option<NaiveDate>,
    pub cancellation_reason: Option<String>,
    pub effective_end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MembershipContractEntity> for MembershipContract {
    fn from(entity: MembershipContractEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            contract_number: entity.contract_number,
            member_id: entity.member_id,
            plan_id: entity.plan_id,
            subscription_id: entity.subscription_id,
            status: ContractStatus::from_str(&entity.status).unwrap_or(ContractStatus::Voided),
            start_date: entity.start_date,
            commitment_months: entity.commitment_months,
            commitment_end_date: entity.commitment_end_date,
            notice_period_days: entity.notice_period_days,
            cooling_off_days: entity.cooling_off_days,
            monthly_fee: entity.monthly_fee,
            termination_fee_type: TerminationFeeType::from_str(&entity.termination_fee_type)
                .unwrap_or(TerminationFeeType::None),
            termination_fee_value: entity.termination_fee_value,
            signed_at: entity.signed_at,
            cancellation_requested_at: entity.cancellation_requested_at,
            cancellation_effective_date: entity.cancellation_effective_date,
            cancellation_reason: entity.cancellation_reason,
            effective_end_date: entity.effective_end_date,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
