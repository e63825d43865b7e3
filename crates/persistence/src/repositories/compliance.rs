//! Data export request and security event repository.

use domain::models::compliance::{
    CreateExportRequest, ExportRequestQuery, RecordSecurityEventRequest, SecurityEventQuery, SeverityCounts,
};
use domain::models::{DataExportRequest, SecurityEvent, Severity};
use serde_json::json;
use shared::pagination::PageRequest;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::{DataExportRequestEntity, SecurityEventEntity, SeverityCountEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct ComplianceRepository {
    pool: PgPool,
}

impl ComplianceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Data export requests

    pub async fn create_export(
        &self,
        tenant_id: Uuid,
        requested_by: Uuid,
        request: &CreateExportRequest,
    ) -> Result<DataExportRequest, sqlx::Error> {
        let timer = QueryTimer::new("create_data_export_request");
        let result = sqlx::query_as::<_, DataExportRequestEntity>(
            r#"
            INSERT INTO data_export_requests (tenant_id, member_id, requested_by, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.member_id)
        .bind(requested_by)
        .bind(&request.reason)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_export(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DataExportRequest>, sqlx::Error> {
        let timer = QueryTimer::new("find_data_export_request");
        let result = sqlx::query_as::<_, DataExportRequestEntity>(
            "SELECT * FROM data_export_requests WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_exports(
        &self,
        tenant_id: Uuid,
        query: &ExportRequestQuery,
        page: &PageRequest,
    ) -> Result<(Vec<DataExportRequest>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_data_export_requests");
        let status = query.status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM data_export_requests
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2) AND ($3::uuid IS NULL OR member_id = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.member_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, DataExportRequestEntity>(
            r#"
            SELECT * FROM data_export_requests
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2) AND ($3::uuid IS NULL OR member_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.member_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update_export(&self, export: &DataExportRequest) -> Result<DataExportRequest, sqlx::Error> {
        let timer = QueryTimer::new("update_data_export_request");
        let result = sqlx::query_as::<_, DataExportRequestEntity>(
            r#"
            UPDATE data_export_requests
            SET status = $3, reviewed_by = $4, reviewed_at = $5, rejection_reason = $6,
                download_url = $7, download_expires_at = $8, error_message = $9, completed_at = $10,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(export.id)
        .bind(export.tenant_id)
        .bind(export.status.as_str())
        .bind(export.reviewed_by)
        .bind(export.reviewed_at)
        .bind(&export.rejection_reason)
        .bind(&export.download_url)
        .bind(export.download_expires_at)
        .bind(&export.error_message)
        .bind(export.completed_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    // Security events

    pub async fn record_event(
        &self,
        tenant_id: Option<Uuid>,
        request: &RecordSecurityEventRequest,
    ) -> Result<SecurityEvent, sqlx::Error> {
        let timer = QueryTimer::new("record_security_event");
        let result = sqlx::query_as::<_, SecurityEventEntity>(
            r#"
            INSERT INTO security_events (
                tenant_id, event_type, severity, user_id, ip_address, user_agent, description, details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&request.event_type)
        .bind(request.severity.as_str())
        .bind(request.user_id)
        .bind(&request.ip_address)
        .bind(&request.user_agent)
        .bind(&request.description)
        .bind(request.details.clone().unwrap_or_else(|| json!({})))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_event(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<SecurityEvent>, sqlx::Error> {
        let timer = QueryTimer::new("find_security_event");
        let result = sqlx::query_as::<_, SecurityEventEntity>(
            "SELECT * FROM security_events WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_events(
        &self,
        tenant_id: Uuid,
        query: &SecurityEventQuery,
        page: &PageRequest,
    ) -> Result<(Vec<SecurityEvent>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_security_events");
        let severity = query.severity.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM security_events
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR event_type = $2)
              AND ($3::text IS NULL OR severity = $3)
              AND ($4::bool IS NULL OR investigated = $4)
              AND ($5::uuid IS NULL OR user_id = $5)
              AND ($6::timestamptz IS NULL OR created_at >= $6)
              AND ($7::timestamptz IS NULL OR created_at <= $7)
            "#,
        )
        .bind(tenant_id)
        .bind(&query.event_type)
        .bind(severity)
        .bind(query.investigated)
        .bind(query.user_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SecurityEventEntity>(
            r#"
            SELECT * FROM security_events
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR event_type = $2)
              AND ($3::text IS NULL OR severity = $3)
              AND ($4::bool IS NULL OR investigated = $4)
              AND ($5::uuid IS NULL OR user_id = $5)
              AND ($6::timestamptz IS NULL OR created_at >= $6)
              AND ($7::timestamptz IS NULL OR created_at <= $7)
            ORDER BY created_at DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(tenant_id)
        .bind(&query.event_type)
        .bind(severity)
        .bind(query.investigated)
        .bind(query.user_id)
        .bind(query.from)
        .bind(query.to)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update_event_investigation(&self, event: &SecurityEvent) -> Result<SecurityEvent, sqlx::Error> {
        let timer = QueryTimer::new("update_security_event_investigation");
        let result = sqlx::query_as::<_, SecurityEventEntity>(
            r#"
            UPDATE security_events
            SET investigated = $2, investigated_by = $3, investigated_at = $4, investigation_notes = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(event.id)
        .bind(event.investigated)
        .bind(event.investigated_by)
        .bind(event.investigated_at)
        .bind(&event.investigation_notes)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn severity_counts(&self, tenant_id: Uuid) -> Result<SeverityCounts, sqlx::Error> {
        let timer = QueryTimer::new("security_event_severity_counts");
        let rows = sqlx::query_as::<_, SeverityCountEntity>(
            r#"
            SELECT severity, COUNT(*) AS total, COUNT(*) FILTER (WHERE NOT investigated) AS uninvestigated
            FROM security_events
            WHERE tenant_id = $1
            GROUP BY severity
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        let mut counts = SeverityCounts::default();
        for row in rows {
            counts.uninvestigated += row.uninvestigated;
            match Severity::from_str(&row.severity) {
                Ok(Severity::Low) => counts.low = row.total,
                Ok(Severity::Medium) => counts.medium = row.total,
                Ok(Severity::High) => counts.high = row.total,
                Ok(Severity::Critical) => counts.critical = row.total,
                Err(_) => {}
            }
        }
        Ok(counts)
    }
}
