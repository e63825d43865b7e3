//! Class pack and class pack balance repository.

use chrono::{DateTime, Utc};
use domain::models::class_pack::CreateClassPackRequest;
use domain::models::{ClassPack, ClassPackBalance};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ClassPackBalanceEntity, ClassPackEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct ClassPackRepository {
    pool: PgPool,
}

impl ClassPackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        request: &CreateClassPackRequest,
    ) -> Result<ClassPack, sqlx::Error> {
        let timer = QueryTimer::new("create_class_pack");
        let result = sqlx::query_as::<_, ClassPackEntity>(
            r#"
            INSERT INTO class_packs (tenant_id, name, description, class_count, price, validity_days)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.class_count)
        .bind(request.price)
        .bind(request.validity_days)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ClassPack>, sqlx::Error> {
        let timer = QueryTimer::new("find_class_pack_by_id");
        let result = sqlx::query_as::<_, ClassPackEntity>(
            "SELECT * FROM class_packs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<ClassPack>, sqlx::Error> {
        let timer = QueryTimer::new("list_class_packs");
        let rows = sqlx::query_as::<_, ClassPackEntity>(
            "SELECT * FROM class_packs WHERE tenant_id = $1 AND (NOT $2 OR is_active) ORDER BY class_count, name",
        )
        .bind(tenant_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update(&self, pack: &ClassPack) -> Result<ClassPack, sqlx::Error> {
        let timer = QueryTimer::new("update_class_pack");
        let result = sqlx::query_as::<_, ClassPackEntity>(
            r#"
            UPDATE class_packs
            SET name = $3, description = $4, class_count = $5, price = $6, validity_days = $7,
                is_active = $8, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(pack.id)
        .bind(pack.tenant_id)
        .bind(&pack.name)
        .bind(&pack.description)
        .bind(pack.class_count)
        .bind(pack.price)
        .bind(pack.validity_days)
        .bind(pack.is_active)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_class_pack");
        let result = sqlx::query("DELETE FROM class_packs WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// ACTIVE balances of the pack that still hold credits.
    pub async fn count_balances_with_credits(&self, tenant_id: Uuid, pack_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_pack_balances_with_credits");
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM class_pack_balances
            WHERE tenant_id = $1 AND class_pack_id = $2 AND status = 'ACTIVE' AND classes_remaining > 0
            "#,
        )
        .bind(tenant_id)
        .bind(pack_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count)
    }

    pub async fn grant_balance(
        &self,
        pack: &ClassPack,
        member_id: Uuid,
        granted_at: DateTime<Utc>,
    ) -> Result<ClassPackBalance, sqlx::Error> {
        let timer = QueryTimer::new("grant_class_pack_balance");
        let result = sqlx::query_as::<_, ClassPackBalanceEntity>(
            r#"
            INSERT INTO class_pack_balances (
                tenant_id, member_id, class_pack_id, classes_total, classes_remaining, expires_at, granted_at
            )
            VALUES ($1, $2, $3, $4, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(pack.tenant_id)
        .bind(member_id)
        .bind(pack.id)
        .bind(pack.class_count)
        .bind(pack.expiry_from(granted_at))
        .bind(granted_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_balance(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ClassPackBalance>, sqlx::Error> {
        let timer = QueryTimer::new("find_class_pack_balance");
        let result = sqlx::query_as::<_, ClassPackBalanceEntity>(
            "SELECT * FROM class_pack_balances WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_balances_for_member(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
    ) -> Result<Vec<ClassPackBalance>, sqlx::Error> {
        let timer = QueryTimer::new("list_class_pack_balances_for_member");
        let rows = sqlx::query_as::<_, ClassPackBalanceEntity>(
            r#"
            SELECT * FROM class_pack_balances
            WHERE tenant_id = $1 AND member_id = $2
            ORDER BY granted_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Usable credits across the member's balances; expired rows not yet flagged are skipped.
    pub async fn total_remaining_credits(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("total_remaining_pack_credits");
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(classes_remaining), 0)::bigint FROM class_pack_balances
            WHERE tenant_id = $1 AND member_id = $2 AND status = 'ACTIVE'
              AND (expires_at IS NULL OR expires_at > $3)
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(total)
    }

    pub async fn update_balance(&self, balance: &ClassPackBalance) -> Result<ClassPackBalance, sqlx::Error> {
        let timer = QueryTimer::new("update_class_pack_balance");
        let result = sqlx::query_as::<_, ClassPackBalanceEntity>(
            r#"
            UPDATE class_pack_balances
            SET classes_remaining = $3, status = $4, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(balance.id)
        .bind(balance.tenant_id)
        .bind(balance.classes_remaining)
        .bind(balance.status.as_str())
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }
}
