//! Compliance route handlers: member data exports and security events.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::compliance::{
    CompleteExportRequest, CreateExportRequest, ExportRequestQuery, FailExportRequest,
    InvestigateEventRequest, RecordSecurityEventRequest, RejectExportRequest, SecurityEventQuery,
    SeverityCounts,
};
use domain::models::{AuditAction, DataExportRequest, SecurityEvent};
use domain::DomainError;
use persistence::repositories::{ComplianceRepository, MemberRepository};
use shared::pagination::Page;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

// Data exports

/// Request a personal data export for a member.
///
/// POST /api/compliance/exports
pub async fn create_export(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateExportRequest>,
) -> Result<(StatusCode, Json<DataExportRequest>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    MemberRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    let export = ComplianceRepository::new(state.pool.clone())
        .create_export(tenant_id, auth.user_id, &request)
        .await?;

    state.audit(auth.audit(AuditAction::ExportRequest).on(export.id));
    info!(tenant_id = %tenant_id, member_id = %export.member_id, "Data export requested");
    Ok((StatusCode::CREATED, Json(export)))
}

/// GET /api/compliance/exports?status=&memberId=&page=&size=
pub async fn list_exports(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ExportRequestQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<DataExportRequest>>, ApiError> {
    let (exports, total) = ComplianceRepository::new(state.pool.clone())
        .list_exports(auth.tenant()?, &query, &page)
        .await?;
    Ok(Json(Page::new(exports, page, total)))
}

async fn load_export(
    state: &AppState,
    tenant_id: Uuid,
    export_id: Uuid,
) -> Result<DataExportRequest, ApiError> {
    ComplianceRepository::new(state.pool.clone())
        .find_export(tenant_id, export_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Export request not found".to_string()))
}

/// GET /api/compliance/exports/:export_id
pub async fn get_export(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(export_id): Path<Uuid>,
) -> Result<Json<DataExportRequest>, ApiError> {
    Ok(Json(load_export(&state, auth.tenant()?, export_id).await?))
}

async fn review<F>(
    state: &AppState,
    auth: &UserAuth,
    export_id: Uuid,
    change: F,
) -> Result<DataExportRequest, ApiError>
where
    F: FnOnce(&mut DataExportRequest) -> Result<(), DomainError>,
{
    let mut export = load_export(state, auth.tenant()?, export_id).await?;
    let from = export.status;
    change(&mut export)?;
    let export = ComplianceRepository::new(state.pool.clone())
        .update_export(&export)
        .await?;

    state.audit(
        auth.audit(AuditAction::ExportReview)
            .on(export.id)
            .with_status_change(from, export.status),
    );
    Ok(export)
}

/// POST /api/compliance/exports/:export_id/approve
pub async fn approve_export(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(export_id): Path<Uuid>,
) -> Result<Json<DataExportRequest>, ApiError> {
    let reviewer = auth.user_id;
    let now = Utc::now();
    let export = review(&state, &auth, export_id, |e| e.approve(reviewer, now)).await?;
    Ok(Json(export))
}

/// POST /api/compliance/exports/:export_id/reject
pub async fn reject_export(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(export_id): Path<Uuid>,
    Json(request): Json<RejectExportRequest>,
) -> Result<Json<DataExportRequest>, ApiError> {
    request.validate()?;
    let reviewer = auth.user_id;
    let now = Utc::now();
    let export = review(&state, &auth, export_id, |e| {
        e.reject(reviewer, request.reason, now)
    })
    .await?;
    Ok(Json(export))
}

/// POST /api/compliance/exports/:export_id/process
pub async fn process_export(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(export_id): Path<Uuid>,
) -> Result<Json<DataExportRequest>, ApiError> {
    let export = review(&state, &auth, export_id, DataExportRequest::start_processing).await?;
    Ok(Json(export))
}

/// POST /api/compliance/exports/:export_id/complete
pub async fn complete_export(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(export_id): Path<Uuid>,
    Json(request): Json<CompleteExportRequest>,
) -> Result<Json<DataExportRequest>, ApiError> {
    request.validate()?;
    let now = Utc::now();
    let export = review(&state, &auth, export_id, |e| {
        e.complete(request.download_url, now)
    })
    .await?;
    Ok(Json(export))
}

/// POST /api/compliance/exports/:export_id/fail
pub async fn fail_export(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(export_id): Path<Uuid>,
    Json(request): Json<FailExportRequest>,
) -> Result<Json<DataExportRequest>, ApiError> {
    request.validate()?;
    let now = Utc::now();
    let export = review(&state, &auth, export_id, |e| {
        e.fail(request.error_message, now)
    })
    .await?;
    Ok(Json(export))
}

// Security events

/// POST /api/compliance/security-events
pub async fn record_security_event(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<RecordSecurityEventRequest>,
) -> Result<(StatusCode, Json<SecurityEvent>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let event = ComplianceRepository::new(state.pool.clone())
        .record_event(Some(tenant_id), &request)
        .await?;

    warn!(
        tenant_id = %tenant_id,
        event_type = %event.event_type,
        severity = %event.severity,
        "Security event recorded"
    );
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/compliance/security-events?eventType=&severity=&investigated=&userId=&from=&to=
pub async fn list_security_events(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<SecurityEventQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<SecurityEvent>>, ApiError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::Validation("'from' must not be after 'to'".to_string()));
        }
    }
    let (events, total) = ComplianceRepository::new(state.pool.clone())
        .list_events(auth.tenant()?, &query, &page)
        .await?;
    Ok(Json(Page::new(events, page, total)))
}

/// GET /api/compliance/security-events/counts
pub async fn security_event_counts(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<SeverityCounts>, ApiError> {
    let counts = ComplianceRepository::new(state.pool.clone())
        .severity_counts(auth.tenant()?)
        .await?;
    Ok(Json(counts))
}

/// GET /api/compliance/security-events/:event_id
pub async fn get_security_event(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SecurityEvent>, ApiError> {
    let event = ComplianceRepository::new(state.pool.clone())
        .find_event(auth.tenant()?, event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Security event not found".to_string()))?;
    Ok(Json(event))
}

/// POST /api/compliance/security-events/:event_id/investigate
pub async fn investigate_security_event(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<InvestigateEventRequest>,
) -> Result<Json<SecurityEvent>, ApiError> {
    request.validate()?;
    let repo = ComplianceRepository::new(state.pool.clone());
    let mut event = repo
        .find_event(auth.tenant()?, event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Security event not found".to_string()))?;
    event.mark_investigated(auth.user_id, request.notes, Utc::now())?;
    let event = repo.update_event_investigation(&event).await?;

    state.audit(
        auth.audit(AuditAction::SecurityEventInvestigate)
            .on(event.id)
            .with_change("investigated", Some("false".into()), Some("true".into())),
    );
    Ok(Json(event))
}
