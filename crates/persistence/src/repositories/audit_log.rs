//! Audit log repository.

use domain::models::audit_log::ListAuditLogsQuery;
use domain::models::{AuditLog, CreateAuditLogInput};
use shared::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AuditLogEntity;
use crate::metrics::QueryTimer;

/// Builds the WHERE clause for audit log filters, tracking parameter positions.
struct AuditLogFilterBuilder {
    conditions: Vec<String>,
    param_count: usize,
}

impl AuditLogFilterBuilder {
    fn build(tenant_id: Option<Uuid>, query: &ListAuditLogsQuery) -> Self {
        let mut builder = Self {
            conditions: Vec::new(),
            param_count: 0,
        };

        if tenant_id.is_some() {
            builder.push("tenant_id = $");
        }
        if query.actor_id.is_some() {
            builder.push("actor_id = $");
        }
        if query.action.is_some() {
            builder.push("action = $");
        }
        if query.resource_type.is_some() {
            builder.push("resource_type = $");
        }
        if query.resource_id.is_some() {
            builder.push("resource_id = $");
        }
        if query.from.is_some() {
            builder.push("timestamp >= $");
        }
        if query.to.is_some() {
            builder.push("timestamp <= $");
        }
        builder
    }

    fn push(&mut self, condition: &str) {
        self.param_count += 1;
        self.conditions.push(format!("{}{}", condition, self.param_count));
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            "TRUE".to_string()
        } else {
            self.conditions.join(" AND ")
        }
    }

    fn param_count(&self) -> usize {
        self.param_count
    }
}

/// Binds the optional filters in the same order the builder numbered them.
macro_rules! bind_query_filters {
    ($builder:expr, $tenant_id:expr, $query:expr) => {{
        let mut b = $builder;
        if let Some(tenant_id) = $tenant_id {
            b = b.bind(tenant_id);
        }
        if let Some(ref actor_id) = $query.actor_id {
            b = b.bind(actor_id);
        }
        if let Some(ref action) = $query.action {
            b = b.bind(action);
        }
        if let Some(ref resource_type) = $query.resource_type {
            b = b.bind(resource_type);
        }
        if let Some(ref resource_id) = $query.resource_id {
            b = b.bind(resource_id);
        }
        if let Some(ref from) = $query.from {
            b = b.bind(from);
        }
        if let Some(ref to) = $query.to {
            b = b.bind(to);
        }
        b
    }};
}

#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, input: CreateAuditLogInput) -> Result<AuditLog, sqlx::Error> {
        let timer = QueryTimer::new("insert_audit_log");
        let changes = input
            .changes
            .as_ref()
            .and_then(|changes| serde_json::to_value(changes).ok());
        let metadata = input
            .metadata()
            .and_then(|metadata| serde_json::to_value(metadata).ok());

        let result = sqlx::query_as::<_, AuditLogEntity>(
            r#"
            INSERT INTO audit_logs (
                tenant_id, actor_id, actor_type, actor_email, action,
                resource_type, resource_id, resource_name, changes, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.actor_id)
        .bind(input.actor_type.as_str())
        .bind(&input.actor_email)
        .bind(input.action.as_str())
        .bind(&input.resource_type)
        .bind(&input.resource_id)
        .bind(&input.resource_name)
        .bind(changes)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    /// Fire-and-forget insert; failures are logged and never reach the caller.
    pub fn insert_async(&self, input: CreateAuditLogInput) {
        let repo = self.clone();
        tokio::spawn(async move {
            let action = input.action;
            if let Err(e) = repo.insert(input).await {
                tracing::warn!(action = %action, error = %e, "Failed to insert audit log");
            }
        });
    }

    /// `tenant_id = None` searches platform-wide.
    pub async fn find_by_id(&self, tenant_id: Option<Uuid>, id: Uuid) -> Result<Option<AuditLog>, sqlx::Error> {
        let timer = QueryTimer::new("find_audit_log");
        let result = sqlx::query_as::<_, AuditLogEntity>(
            "SELECT * FROM audit_logs WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Newest first. `tenant_id = None` lists every tenant and platform-level entries.
    pub async fn list(
        &self,
        tenant_id: Option<Uuid>,
        query: &ListAuditLogsQuery,
        page: &PageRequest,
    ) -> Result<(Vec<AuditLog>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_audit_logs");
        let filters = AuditLogFilterBuilder::build(tenant_id, query);
        let where_clause = filters.where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM audit_logs WHERE {}", where_clause);
        let total: i64 = bind_query_filters!(sqlx::query_scalar(&count_sql), tenant_id, query)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "SELECT * FROM audit_logs WHERE {} ORDER BY timestamp DESC LIMIT ${} OFFSET ${}",
            where_clause,
            filters.param_count() + 1,
            filters.param_count() + 2
        );
        let rows: Vec<AuditLogEntity> = bind_query_filters!(
            sqlx::query_as::<_, AuditLogEntity>(&select_sql),
            tenant_id,
            query
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_filter_builder_without_tenant() {
        let builder = AuditLogFilterBuilder::build(None, &ListAuditLogsQuery::default());
        assert_eq!(builder.where_clause(), "TRUE");
        assert_eq!(builder.param_count(), 0);
    }

    #[test]
    fn test_filter_builder_numbers_parameters_in_order() {
        let query = ListAuditLogsQuery {
            action: Some("member.update".to_string()),
            from: Some(Utc::now()),
            ..Default::default()
        };
        let builder = AuditLogFilterBuilder::build(Some(Uuid::new_v4()), &query);
        assert_eq!(
            builder.where_clause(),
            "tenant_id = $1 AND action = $2 AND timestamp >= $3"
        );
        assert_eq!(builder.param_count(), 3);
    }
}
