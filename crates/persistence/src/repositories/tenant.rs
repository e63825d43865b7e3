//! Tenant repository for database operations.

use domain::models::{Tenant, TenantStatus};
use shared::pagination::PageRequest;
use sqlx::{PgExecutor, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::TenantEntity;
use crate::metrics::QueryTimer;

/// Repository for tenant (club) database operations.
#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    /// Creates a new TenantRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a tenant. Runs on any executor so it can join a transaction.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        slug: &str,
        contact_email: Option<&str>,
        timezone: &str,
    ) -> Result<Tenant, sqlx::Error> {
        let timer = QueryTimer::new("insert_tenant");
        let result = sqlx::query_as::<_, TenantEntity>(
            r#"
            INSERT INTO tenants (name, slug, contact_email, timezone)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(contact_email)
        .bind(timezone)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, sqlx::Error> {
        let timer = QueryTimer::new("find_tenant_by_id");
        let result = sqlx::query_as::<_, TenantEntity>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, sqlx::Error> {
        let timer = QueryTimer::new("find_tenant_by_slug");
        let result = sqlx::query_as::<_, TenantEntity>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug.to_lowercase())
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Returns only the status column, used by the request guard on every tenant call.
    pub async fn find_status(&self, id: Uuid) -> Result<Option<TenantStatus>, sqlx::Error> {
        let timer = QueryTimer::new("find_tenant_status");
        let result: Option<String> =
            sqlx::query_scalar("SELECT status FROM tenants WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        timer.record();
        Ok(result.and_then(|s| TenantStatus::from_str(&s).ok()))
    }

    /// Lists tenants ordered by name, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<TenantStatus>,
        page: &PageRequest,
    ) -> Result<(Vec<Tenant>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_tenants");
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tenants WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, TenantEntity>(
            r#"
            SELECT * FROM tenants
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, tenant: &Tenant) -> Result<Tenant, sqlx::Error> {
        let timer = QueryTimer::new("update_tenant");
        let result = sqlx::query_as::<_, TenantEntity>(
            r#"
            UPDATE tenants
            SET name = $2, contact_email = $3, timezone = $4, status = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.contact_email)
        .bind(&tenant.timezone)
        .bind(tenant.status.as_str())
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }
}
