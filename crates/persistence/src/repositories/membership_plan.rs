//! Membership plan repository for database operations.

use domain::models::membership_plan::CreatePlanRequest;
use domain::models::MembershipPlan;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::MembershipPlanEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct MembershipPlanRepository {
    pool: PgPool,
}

impl MembershipPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        request: &CreatePlanRequest,
        currency: &str,
    ) -> Result<MembershipPlan, sqlx::Error> {
        let timer = QueryTimer::new("create_membership_plan");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(
            r#"
            INSERT INTO membership_plans (
                tenant_id, name, description, price, currency, billing_period,
                duration_days, max_classes, freeze_days_allowed, guest_passes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(currency)
        .bind(request.billing_period.as_str())
        .bind(request.duration_days)
        .bind(request.max_classes)
        .bind(request.freeze_days_allowed)
        .bind(request.guest_passes)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<MembershipPlan>, sqlx::Error> {
        let timer = QueryTimer::new("find_membership_plan_by_id");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(
            "SELECT * FROM membership_plans WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Lists plans ordered by price; `active_only` hides deactivated plans.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<MembershipPlan>, sqlx::Error> {
        let timer = QueryTimer::new("list_membership_plans");
        let rows = sqlx::query_as::<_, MembershipPlanEntity>(
            r#"
            SELECT * FROM membership_plans
            WHERE tenant_id = $1 AND (NOT $2 OR is_active)
            ORDER BY price, name
            "#,
        )
        .bind(tenant_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update(&self, plan: &MembershipPlan) -> Result<MembershipPlan, sqlx::Error> {
        let timer = QueryTimer::new("update_membership_plan");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(
            r#"
            UPDATE membership_plans
            SET name = $3, description = $4, price = $5, duration_days = $6,
                freeze_days_allowed = $7, guest_passes = $8, is_active = $9, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(plan.id)
        .bind(plan.tenant_id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.price)
        .bind(plan.duration_days)
        .bind(plan.freeze_days_allowed)
        .bind(plan.guest_passes)
        .bind(plan.is_active)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_membership_plan");
        let result = sqlx::query("DELETE FROM membership_plans WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// Number of subscriptions referencing the plan; a referenced plan cannot be deleted.
    pub async fn count_subscriptions(&self, tenant_id: Uuid, id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_plan_subscriptions");
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions WHERE tenant_id = $1 AND plan_id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count)
    }
}
