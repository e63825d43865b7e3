//! Global settings and maintenance window repository.

use chrono::{DateTime, Utc};
use domain::models::platform::{CreateMaintenanceWindowRequest, CreateSettingRequest};
use domain::models::{GlobalSetting, MaintenanceWindow};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{GlobalSettingEntity, MaintenanceWindowEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct PlatformRepository {
    pool: PgPool,
}

impl PlatformRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Settings

    pub async fn create_setting(
        &self,
        request: &CreateSettingRequest,
        created_by: Uuid,
    ) -> Result<GlobalSetting, sqlx::Error> {
        let timer = QueryTimer::new("create_global_setting");
        let result = sqlx::query_as::<_, GlobalSettingEntity>(
            r#"
            INSERT INTO global_settings (key, value, value_type, category, description, is_editable, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.key)
        .bind(&request.value)
        .bind(request.value_type.as_str())
        .bind(&request.category)
        .bind(&request.description)
        .bind(request.is_editable)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_setting(&self, key: &str) -> Result<Option<GlobalSetting>, sqlx::Error> {
        let timer = QueryTimer::new("find_global_setting");
        let result = sqlx::query_as::<_, GlobalSettingEntity>("SELECT * FROM global_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_settings(&self, category: Option<&str>) -> Result<Vec<GlobalSetting>, sqlx::Error> {
        let timer = QueryTimer::new("list_global_settings");
        let rows = sqlx::query_as::<_, GlobalSettingEntity>(
            "SELECT * FROM global_settings WHERE ($1::text IS NULL OR category = $1) ORDER BY category, key",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_setting(&self, setting: &GlobalSetting) -> Result<GlobalSetting, sqlx::Error> {
        let timer = QueryTimer::new("update_global_setting");
        let result = sqlx::query_as::<_, GlobalSettingEntity>(
            r#"
            UPDATE global_settings SET value = $2, updated_by = $3, updated_at = NOW()
            WHERE key = $1
            RETURNING *
            "#,
        )
        .bind(&setting.key)
        .bind(&setting.value)
        .bind(setting.updated_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    // Maintenance windows

    pub async fn create_window(
        &self,
        request: &CreateMaintenanceWindowRequest,
        created_by: Uuid,
    ) -> Result<MaintenanceWindow, sqlx::Error> {
        let timer = QueryTimer::new("create_maintenance_window");
        let result = sqlx::query_as::<_, MaintenanceWindowEntity>(
            r#"
            INSERT INTO maintenance_windows (tenant_id, title, message, starts_at, ends_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.tenant_id)
        .bind(&request.title)
        .bind(&request.message)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_window(&self, id: Uuid) -> Result<Option<MaintenanceWindow>, sqlx::Error> {
        let timer = QueryTimer::new("find_maintenance_window");
        let result = sqlx::query_as::<_, MaintenanceWindowEntity>("SELECT * FROM maintenance_windows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Windows that have not ended yet, or all of them with `include_past`.
    pub async fn list_windows(
        &self,
        include_past: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceWindow>, sqlx::Error> {
        let timer = QueryTimer::new("list_maintenance_windows");
        let rows = sqlx::query_as::<_, MaintenanceWindowEntity>(
            "SELECT * FROM maintenance_windows WHERE ($1 OR ends_at > $2) ORDER BY starts_at",
        )
        .bind(include_past)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The scheduled window covering `now` for the tenant (or platform-wide), if any.
    pub async fn active_window(
        &self,
        tenant_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<MaintenanceWindow>, sqlx::Error> {
        let timer = QueryTimer::new("active_maintenance_window");
        let result = sqlx::query_as::<_, MaintenanceWindowEntity>(
            r#"
            SELECT * FROM maintenance_windows
            WHERE status = 'SCHEDULED' AND starts_at <= $2 AND ends_at > $2
              AND (tenant_id IS NULL OR tenant_id = $1)
            ORDER BY starts_at
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn update_window(&self, window: &MaintenanceWindow) -> Result<MaintenanceWindow, sqlx::Error> {
        let timer = QueryTimer::new("update_maintenance_window");
        let result = sqlx::query_as::<_, MaintenanceWindowEntity>(
            r#"
            UPDATE maintenance_windows
            SET title = $2, message = $3, starts_at = $4, ends_at = $5, status = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(window.id)
        .bind(&window.title)
        .bind(&window.message)
        .bind(window.starts_at)
        .bind(window.ends_at)
        .bind(window.status.as_str())
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }
}
