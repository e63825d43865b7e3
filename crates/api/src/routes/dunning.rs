//! Dunning sequence handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::dunning::{
    DunningEvent, EscalateDunningRequest, RecordRetryRequest, ResolveDunningRequest,
    StartDunningRequest,
};
use domain::models::{AuditAction, DunningSequence, DunningStatus};
use persistence::repositories::{DunningRepository, InvoiceRepository};
use serde::Deserialize;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};
use crate::services::BillingService;

#[derive(Debug, Deserialize)]
pub struct ListDunningQuery {
    pub status: Option<DunningStatus>,
}

async fn load(
    state: &AppState,
    tenant_id: Uuid,
    sequence_id: Uuid,
) -> Result<DunningSequence, ApiError> {
    DunningRepository::new(state.pool.clone())
        .find_by_id(tenant_id, sequence_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Dunning sequence not found".to_string()))
}

fn billing(state: &AppState) -> BillingService {
    BillingService::new(state.pool.clone(), state.config.billing.clone())
}

fn audit_status(
    state: &AppState,
    auth: &UserAuth,
    from: DunningStatus,
    sequence: &DunningSequence,
) {
    state.audit(
        auth.audit(AuditAction::DunningStatusChange)
            .on(sequence.id)
            .with_status_change(from, sequence.status),
    );
}

/// Open a dunning sequence for an unpaid invoice.
///
/// POST /api/dunning
pub async fn start_dunning(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<StartDunningRequest>,
) -> Result<(StatusCode, Json<DunningSequence>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let invoice = InvoiceRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.invoice_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;

    let sequence = billing(&state)
        .start_dunning(&invoice, request.failure_reason, Utc::now())
        .await?;

    state.audit(
        auth.audit(AuditAction::DunningStart)
            .on(sequence.id)
            .with_resource_name(invoice.invoice_number),
    );
    Ok((StatusCode::CREATED, Json(sequence)))
}

/// GET /api/dunning?status=&page=&size=
pub async fn list_dunning(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListDunningQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<DunningSequence>>, ApiError> {
    let (sequences, total) = DunningRepository::new(state.pool.clone())
        .list(auth.tenant()?, query.status, &page)
        .await?;
    Ok(Json(Page::new(sequences, page, total)))
}

/// GET /api/dunning/:sequence_id
pub async fn get_dunning(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(sequence_id): Path<Uuid>,
) -> Result<Json<DunningSequence>, ApiError> {
    Ok(Json(load(&state, auth.tenant()?, sequence_id).await?))
}

/// GET /api/dunning/:sequence_id/timeline
pub async fn timeline(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(sequence_id): Path<Uuid>,
) -> Result<Json<Vec<DunningEvent>>, ApiError> {
    let sequence = load(&state, auth.tenant()?, sequence_id).await?;
    Ok(Json(sequence.timeline()))
}

/// Record the result of a payment retry.
///
/// POST /api/dunning/:sequence_id/retry
pub async fn record_retry(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(sequence_id): Path<Uuid>,
    Json(request): Json<RecordRetryRequest>,
) -> Result<Json<DunningSequence>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let sequence = load(&state, tenant_id, sequence_id).await?;
    let from = sequence.status;
    let sequence = billing(&state)
        .retry_dunning(sequence, request.success, request.result, Utc::now())
        .await?;

    if sequence.status != from {
        audit_status(&state, &auth, from, &sequence);
    }
    info!(
        tenant_id = %tenant_id,
        sequence_id = %sequence.id,
        success = request.success,
        retry_count = sequence.retry_count,
        "Dunning retry recorded"
    );
    Ok(Json(sequence))
}

/// Suspend the member's subscription for non-payment.
///
/// POST /api/dunning/:sequence_id/suspend
pub async fn suspend(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(sequence_id): Path<Uuid>,
) -> Result<Json<DunningSequence>, ApiError> {
    let sequence = load(&state, auth.tenant()?, sequence_id).await?;
    let from = sequence.status;
    let sequence = billing(&state).suspend_dunning(sequence, Utc::now()).await?;
    if sequence.status != from {
        audit_status(&state, &auth, from, &sequence);
    }
    Ok(Json(sequence))
}

/// POST /api/dunning/:sequence_id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(sequence_id): Path<Uuid>,
) -> Result<Json<DunningSequence>, ApiError> {
    let sequence = load(&state, auth.tenant()?, sequence_id).await?;
    let from = sequence.status;
    let sequence = billing(&state).deactivate_dunning(sequence, Utc::now()).await?;
    audit_status(&state, &auth, from, &sequence);
    Ok(Json(sequence))
}

/// Close the sequence by hand, e.g. after a payment arranged outside the system.
///
/// POST /api/dunning/:sequence_id/resolve
pub async fn resolve(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(sequence_id): Path<Uuid>,
    Json(request): Json<ResolveDunningRequest>,
) -> Result<Json<DunningSequence>, ApiError> {
    request.validate()?;
    let mut sequence = load(&state, auth.tenant()?, sequence_id).await?;
    let from = sequence.status;
    sequence.resolve_manually(request.notes)?;
    let sequence = DunningRepository::new(state.pool.clone())
        .update(&sequence)
        .await?;
    audit_status(&state, &auth, from, &sequence);
    Ok(Json(sequence))
}

/// POST /api/dunning/:sequence_id/escalate
pub async fn escalate(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(sequence_id): Path<Uuid>,
    Json(request): Json<EscalateDunningRequest>,
) -> Result<Json<DunningSequence>, ApiError> {
    let mut sequence = load(&state, auth.tenant()?, sequence_id).await?;
    if !sequence.escalate_to_csm(request.csm_id, Utc::now()) {
        return Ok(Json(sequence));
    }
    let sequence = DunningRepository::new(state.pool.clone())
        .update(&sequence)
        .await?;
    state.audit(
        auth.audit(AuditAction::DunningStatusChange)
            .on(sequence.id)
            .with_change("escalatedToCsm", Some("false".into()), Some("true".into())),
    );
    Ok(Json(sequence))
}

/// Mark a notification step as delivered.
///
/// POST /api/dunning/:sequence_id/steps/:step_id/sent
pub async fn mark_step_sent(
    State(state): State<AppState>,
    auth: UserAuth,
    Path((sequence_id, step_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DunningSequence>, ApiError> {
    let mut sequence = load(&state, auth.tenant()?, sequence_id).await?;
    sequence.mark_step_sent(step_id, Utc::now())?;
    let sequence = DunningRepository::new(state.pool.clone())
        .update(&sequence)
        .await?;
    Ok(Json(sequence))
}
