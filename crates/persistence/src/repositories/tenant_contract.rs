//! Platform-to-tenant contract repository.

use domain::models::tenant_contract::{CreateTenantContractRequest, TenantContractQuery};
use domain::models::TenantContract;
use shared::pagination::PageRequest;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::TenantContractEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct TenantContractRepository {
    pool: PgPool,
}

impl TenantContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        contract_number: &str,
        request: &CreateTenantContractRequest,
        currency: &str,
    ) -> Result<TenantContract, sqlx::Error> {
        let timer = QueryTimer::new("insert_tenant_contract");
        let result = sqlx::query_as::<_, TenantContractEntity>(
            r#"
            INSERT INTO tenant_contracts (
                tenant_id, contract_number, title, start_date, end_date, monthly_fee, currency, terms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.tenant_id)
        .bind(contract_number)
        .bind(&request.title)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.monthly_fee)
        .bind(currency)
        .bind(&request.terms)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<TenantContract>, sqlx::Error> {
        let timer = QueryTimer::new("find_tenant_contract_by_id");
        let result = sqlx::query_as::<_, TenantContractEntity>("SELECT * FROM tenant_contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list(
        &self,
        query: &TenantContractQuery,
        page: &PageRequest,
    ) -> Result<(Vec<TenantContract>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_tenant_contracts");
        let status = query.status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tenant_contracts
            WHERE ($1::uuid IS NULL OR tenant_id = $1) AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(query.tenant_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, TenantContractEntity>(
            r#"
            SELECT * FROM tenant_contracts
            WHERE ($1::uuid IS NULL OR tenant_id = $1) AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.tenant_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, contract: &TenantContract) -> Result<TenantContract, sqlx::Error> {
        let timer = QueryTimer::new("update_tenant_contract");
        let result = sqlx::query_as::<_, TenantContractEntity>(
            r#"
            UPDATE tenant_contracts
            SET status = $2, sent_at = $3, signed_at = $4, signed_by = $5, terminated_at = $6,
                termination_reason = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(contract.id)
        .bind(contract.status.as_str())
        .bind(contract.sent_at)
        .bind(contract.signed_at)
        .bind(&contract.signed_by)
        .bind(contract.terminated_at)
        .bind(&contract.termination_reason)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }
}
