//! Subscription repository for database operations.

use chrono::NaiveDate;
use domain::models::subscription::NewSubscription;
use domain::models::{Subscription, SubscriptionStatus};
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::SubscriptionEntity;
use crate::metrics::QueryTimer;

/// Repository for member subscription database operations.
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    /// Creates a new SubscriptionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        new: &NewSubscription,
    ) -> Result<Subscription, sqlx::Error> {
        let timer = QueryTimer::new("create_subscription");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            INSERT INTO subscriptions (
                tenant_id, member_id, plan_id, status, start_date, end_date, classes_remaining,
                guest_passes_remaining, freeze_days_remaining, price, paid_amount, auto_renew
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.member_id)
        .bind(new.plan_id)
        .bind(new.status.as_str())
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.classes_remaining)
        .bind(new.guest_passes_remaining)
        .bind(new.freeze_days_remaining)
        .bind(new.price)
        .bind(new.paid_amount)
        .bind(new.auto_renew)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let timer = QueryTimer::new("find_subscription_by_id");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            "SELECT * FROM subscriptions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Locks a subscription row for the rest of the transaction.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let timer = QueryTimer::new("lock_subscription_by_id");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            "SELECT * FROM subscriptions WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Locks the member's current ACTIVE subscription (latest end date first), if any.
    pub async fn lock_active_for_member(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        member_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let timer = QueryTimer::new("lock_active_subscription_for_member");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            SELECT * FROM subscriptions
            WHERE tenant_id = $1 AND member_id = $2 AND status = 'ACTIVE' AND end_date >= $3
            ORDER BY end_date DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(today)
        .fetch_optional(conn)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_active_for_member(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_subscription_for_member");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            SELECT * FROM subscriptions
            WHERE tenant_id = $1 AND member_id = $2 AND status = 'ACTIVE' AND end_date >= $3
            ORDER BY end_date DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        member_id: Option<Uuid>,
        status: Option<SubscriptionStatus>,
        page: &PageRequest,
    ) -> Result<(Vec<Subscription>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_subscriptions");
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR member_id = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            SELECT * FROM subscriptions
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR member_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY start_date DESC
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

    /// Writes back every mutable column of the subscription.
    pub async fn save<'e, E: PgExecutor<'e>>(
        executor: E,
        subscription: &Subscription,
    ) -> Result<Subscription, sqlx::Error> {
        let timer = QueryTimer::new("update_subscription");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            UPDATE subscriptions
            SET status = $3, end_date = $4, classes_remaining = $5, guest_passes_remaining = $6,
                freeze_days_remaining = $7, frozen_at = $8, paid_amount = $9, auto_renew = $10,
                past_due_at = $11, suspended_at = $12, cancellation_requested_at = $13,
                cancellation_effective_date = $14, cancellation_reason = $15, cancelled_at = $16,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.tenant_id)
        .bind(subscription.status.as_str())
        .bind(subscription.end_date)
        .bind(subscription.classes_remaining)
        .bind(subscription.guest_passes_remaining)
        .bind(subscription.freeze_days_remaining)
        .bind(subscription.frozen_at)
        .bind(subscription.paid_amount)
        .bind(subscription.auto_renew)
        .bind(subscription.past_due_at)
        .bind(subscription.suspended_at)
        .bind(subscription.cancellation_requested_at)
        .bind(subscription.cancellation_effective_date)
        .bind(&subscription.cancellation_reason)
        .bind(subscription.cancelled_at)
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn update(&self, subscription: &Subscription) -> Result<Subscription, sqlx::Error> {
        Self::save(&self.pool, subscription).await
    }

    /// Subscriptions across all tenants that the expiry job has to look at:
    /// ACTIVE past their end date and PENDING_CANCELLATION past their effective date.
    pub async fn find_due_for_expiry(
        &self,
        today: NaiveDate,
        limit: i64,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let timer = QueryTimer::new("find_subscriptions_due_for_expiry");
        let rows = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            SELECT * FROM subscriptions
            WHERE (status = 'ACTIVE' AND end_date < $1)
               OR (status = 'PENDING_CANCELLATION' AND cancellation_effective_date <= $1)
            ORDER BY end_date
            LIMIT $2
            "#,
        )
        .bind(today)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
