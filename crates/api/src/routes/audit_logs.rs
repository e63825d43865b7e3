//! Audit log routes.
//!
//! Club administrators see their own club's entries; platform administrators
//! see every entry.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::audit_log::ListAuditLogsQuery;
use domain::models::AuditLog;
use persistence::repositories::AuditLogRepository;
use shared::pagination::Page;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

/// List audit logs with filtering and pagination, newest first.
///
/// GET /api/audit-logs?actorId=&action=&resourceType=&resourceId=&from=&to=&page=&size=
pub async fn list_audit_logs(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListAuditLogsQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<AuditLog>>, ApiError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::Validation("'from' must not be after 'to'".to_string()));
        }
    }
    let (logs, total) = AuditLogRepository::new(state.pool.clone())
        .list(auth.tenant_id, &query, &page)
        .await?;
    Ok(Json(Page::new(logs, page, total)))
}

/// GET /api/audit-logs/:log_id
pub async fn get_audit_log(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(log_id): Path<Uuid>,
) -> Result<Json<AuditLog>, ApiError> {
    let log = AuditLogRepository::new(state.pool.clone())
        .find_by_id(auth.tenant_id, log_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Audit log not found".to_string()))?;
    Ok(Json(log))
}
