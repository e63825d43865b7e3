//! Gym class repository.

use domain::models::gym_class::{
    CreateClassRequest, DEFAULT_DURATION_MINUTES, DEFAULT_MAX_CAPACITY, DEFAULT_MAX_WAITLIST_SIZE,
};
use domain::models::{ClassStatus, GymClass};
use shared::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::GymClassEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct GymClassRepository {
    pool: PgPool,
}

impl GymClassRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        request: &CreateClassRequest,
    ) -> Result<GymClass, sqlx::Error> {
        let timer = QueryTimer::new("create_gym_class");
        let result = sqlx::query_as::<_, GymClassEntity>(
            r#"
            INSERT INTO gym_classes (
                tenant_id, name, description, trainer_id, location_id, max_capacity,
                duration_minutes, waitlist_enabled, max_waitlist_size, deducts_class_from_plan
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.trainer_id)
        .bind(request.location_id)
        .bind(request.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY))
        .bind(request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))
        .bind(request.waitlist_enabled.unwrap_or(true))
        .bind(request.max_waitlist_size.unwrap_or(DEFAULT_MAX_WAITLIST_SIZE))
        .bind(request.deducts_class_from_plan.unwrap_or(true))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<GymClass>, sqlx::Error> {
        let timer = QueryTimer::new("find_gym_class_by_id");
        let result = sqlx::query_as::<_, GymClassEntity>(
            "SELECT * FROM gym_classes WHERE id = $1 AND tenant_id = $2",
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
        status: Option<ClassStatus>,
        page: &PageRequest,
    ) -> Result<(Vec<GymClass>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_gym_classes");
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM gym_classes WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(tenant_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, GymClassEntity>(
            r#"
            SELECT * FROM gym_classes
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, class: &GymClass) -> Result<GymClass, sqlx::Error> {
        let timer = QueryTimer::new("update_gym_class");
        let result = sqlx::query_as::<_, GymClassEntity>(
            r#"
            UPDATE gym_classes
            SET name = $3, description = $4, trainer_id = $5, location_id = $6, max_capacity = $7,
                duration_minutes = $8, waitlist_enabled = $9, max_waitlist_size = $10,
                deducts_class_from_plan = $11, status = $12, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(class.id)
        .bind(class.tenant_id)
        .bind(&class.name)
        .bind(&class.description)
        .bind(class.trainer_id)
        .bind(class.location_id)
        .bind(class.max_capacity)
        .bind(class.duration_minutes)
        .bind(class.waitlist_enabled)
        .bind(class.max_waitlist_size)
        .bind(class.deducts_class_from_plan)
        .bind(class.status.as_str())
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_gym_class");
        let result = sqlx::query("DELETE FROM gym_classes WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
