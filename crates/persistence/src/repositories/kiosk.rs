//! Kiosk device and kiosk session repository.

use chrono::{DateTime, Utc};
use domain::models::kiosk::CreateKioskRequest;
use domain::models::{KioskDevice, KioskSession};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{KioskDeviceEntity, KioskSessionEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct KioskRepository {
    pool: PgPool,
}

impl KioskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Devices

    pub async fn create_device(
        &self,
        tenant_id: Uuid,
        request: &CreateKioskRequest,
    ) -> Result<KioskDevice, sqlx::Error> {
        let timer = QueryTimer::new("create_kiosk_device");
        let result = sqlx::query_as::<_, KioskDeviceEntity>(
            r#"
            INSERT INTO kiosk_devices (tenant_id, location_id, code, name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.location_id)
        .bind(request.code.to_uppercase())
        .bind(&request.name)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_device(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<KioskDevice>, sqlx::Error> {
        let timer = QueryTimer::new("find_kiosk_device");
        let result = sqlx::query_as::<_, KioskDeviceEntity>(
            "SELECT * FROM kiosk_devices WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_device_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<KioskDevice>, sqlx::Error> {
        let timer = QueryTimer::new("find_kiosk_device_by_code");
        let result = sqlx::query_as::<_, KioskDeviceEntity>(
            "SELECT * FROM kiosk_devices WHERE tenant_id = $1 AND code = $2",
        )
        .bind(tenant_id)
        .bind(code.to_uppercase())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_devices(
        &self,
        tenant_id: Uuid,
        location_id: Option<Uuid>,
    ) -> Result<Vec<KioskDevice>, sqlx::Error> {
        let timer = QueryTimer::new("list_kiosk_devices");
        let rows = sqlx::query_as::<_, KioskDeviceEntity>(
            r#"
            SELECT * FROM kiosk_devices
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY code
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_device(&self, device: &KioskDevice) -> Result<KioskDevice, sqlx::Error> {
        let timer = QueryTimer::new("update_kiosk_device");
        let result = sqlx::query_as::<_, KioskDeviceEntity>(
            r#"
            UPDATE kiosk_devices
            SET location_id = $3, name = $4, status = $5, last_heartbeat_at = $6, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(device.id)
        .bind(device.tenant_id)
        .bind(device.location_id)
        .bind(&device.name)
        .bind(device.status.as_str())
        .bind(device.last_heartbeat_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete_device(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_kiosk_device");
        let result = sqlx::query("DELETE FROM kiosk_devices WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    // Sessions

    pub async fn create_session(&self, session: &KioskSession) -> Result<KioskSession, sqlx::Error> {
        let timer = QueryTimer::new("create_kiosk_session");
        let result = sqlx::query_as::<_, KioskSessionEntity>(
            r#"
            INSERT INTO kiosk_sessions (id, tenant_id, device_id, status, started_at, last_activity_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(session.device_id)
        .bind(session.status.as_str())
        .bind(session.started_at)
        .bind(session.last_activity_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_session(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<KioskSession>, sqlx::Error> {
        let timer = QueryTimer::new("find_kiosk_session");
        let result = sqlx::query_as::<_, KioskSessionEntity>(
            "SELECT * FROM kiosk_sessions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn update_session(&self, session: &KioskSession) -> Result<KioskSession, sqlx::Error> {
        let timer = QueryTimer::new("update_kiosk_session");
        let result = sqlx::query_as::<_, KioskSessionEntity>(
            r#"
            UPDATE kiosk_sessions
            SET member_id = $3, identification_method = $4, status = $5, attendance_id = $6,
                last_activity_at = $7, ended_at = $8
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(session.member_id)
        .bind(session.identification_method.map(|m| m.as_str()))
        .bind(session.status.as_str())
        .bind(session.attendance_id)
        .bind(session.last_activity_at)
        .bind(session.ended_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    /// Expires ACTIVE sessions of every tenant idle since before `cutoff`.
    pub async fn expire_idle_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("expire_idle_kiosk_sessions");
        let result = sqlx::query(
            r#"
            UPDATE kiosk_sessions SET status = 'EXPIRED', ended_at = NOW()
            WHERE status = 'ACTIVE' AND last_activity_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}
