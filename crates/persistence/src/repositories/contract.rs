//! Membership contract repository.

use domain::models::contract::{
    CreateContractRequest, TerminationFeeType, DEFAULT_CONTRACT_NOTICE_DAYS, DEFAULT_COOLING_OFF_DAYS,
};
use domain::models::{ContractStatus, MembershipContract};
use shared::pagination::PageRequest;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::MembershipContractEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct ContractRepository {
    pool: PgPool,
}

impl ContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a PENDING_SIGNATURE contract. The commitment end date is derived
    /// from the start date and commitment length.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        tenant_id: Uuid,
        contract_number: &str,
        request: &CreateContractRequest,
    ) -> Result<MembershipContract, sqlx::Error> {
        let timer = QueryTimer::new("insert_membership_contract");
        let result = sqlx::query_as::<_, MembershipContractEntity>(
            r#"
            INSERT INTO membership_contracts (
                tenant_id, contract_number, member_id, plan_id, subscription_id, start_date,
                commitment_months, commitment_end_date, notice_period_days, cooling_off_days,
                monthly_fee, termination_fee_type, termination_fee_value
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                CASE WHEN $7 > 0 THEN ($6 + make_interval(months => $7))::date END,
                $8, $9, $10, $11, $12
            )
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(contract_number)
        .bind(request.member_id)
        .bind(request.plan_id)
        .bind(request.subscription_id)
        .bind(request.start_date)
        .bind(request.commitment_months)
        .bind(request.notice_period_days.unwrap_or(DEFAULT_CONTRACT_NOTICE_DAYS))
        .bind(request.cooling_off_days.unwrap_or(DEFAULT_COOLING_OFF_DAYS))
        .bind(request.monthly_fee)
        .bind(
            request
                .termination_fee_type
                .unwrap_or(TerminationFeeType::None)
                .as_str(),
        )
        .bind(request.termination_fee_value)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<MembershipContract>, sqlx::Error> {
        let timer = QueryTimer::new("find_membership_contract_by_id");
        let result = sqlx::query_as::<_, MembershipContractEntity>(
            "SELECT * FROM membership_contracts WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        member_id: Option<Uuid>,
        status: Option<ContractStatus>,
        page: &PageRequest,
    ) -> Result<(Vec<MembershipContract>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_membership_contracts");
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM membership_contracts
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR member_id = $2) AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, MembershipContractEntity>(
            r#"
            SELECT * FROM membership_contracts
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR member_id = $2) AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, contract: &MembershipContract) -> Result<MembershipContract, sqlx::Error> {
        let timer = QueryTimer::new("update_membership_contract");
        let result = sqlx::query_as::<_, MembershipContractEntity>(
            r#"
            UPDATE membership_contracts
            SET status = $3, signed_at = $4, cancellation_requested_at = $5,
                cancellation_effective_date = $6, cancellation_reason = $7, effective_end_date = $8,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(contract.id)
        .bind(contract.tenant_id)
        .bind(contract.status.as_str())
        .bind(contract.signed_at)
        .bind(contract.cancellation_requested_at)
        .bind(contract.cancellation_effective_date)
        .bind(&contract.cancellation_reason)
        .bind(contract.effective_end_date)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }
}
