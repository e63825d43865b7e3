//! Platform service contracts with clubs. Platform administrators only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use domain::models::tenant_contract::{
    CreateTenantContractRequest, SignTenantContractRequest, TenantContractQuery,
    TerminateTenantContractRequest,
};
use domain::models::{AuditAction, TenantContract};
use domain::DomainError;
use persistence::repositories::{next_number, NumberSeries, TenantContractRepository, TenantRepository};
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

/// Loads a contract, expiring it first when its end date has passed.
async fn load(state: &AppState, contract_id: Uuid) -> Result<TenantContract, ApiError> {
    let repo = TenantContractRepository::new(state.pool.clone());
    let mut contract = repo
        .find_by_id(contract_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tenant contract not found".to_string()))?;
    if contract.expire_if_due(Utc::now().date_naive()) {
        contract = repo.update(&contract).await?;
        info!(contract_id = %contract.id, "Tenant contract expired");
    }
    Ok(contract)
}

async fn transition<F>(
    state: &AppState,
    auth: &UserAuth,
    contract_id: Uuid,
    change: F,
) -> Result<TenantContract, ApiError>
where
    F: FnOnce(&mut TenantContract) -> Result<(), DomainError>,
{
    let mut contract = load(state, contract_id).await?;
    let from = contract.status;
    change(&mut contract)?;
    let contract = TenantContractRepository::new(state.pool.clone())
        .update(&contract)
        .await?;

    state.audit(
        auth.audit(AuditAction::TenantContractChange)
            .on(contract.id)
            .with_resource_name(contract.contract_number.clone())
            .with_status_change(from, contract.status),
    );
    info!(
        contract_id = %contract.id,
        tenant_id = %contract.tenant_id,
        from = %from,
        to = %contract.status,
        "Tenant contract status changed"
    );
    Ok(contract)
}

/// Draft a contract for a club.
///
/// POST /api/platform/tenant-contracts
pub async fn create_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateTenantContractRequest>,
) -> Result<(StatusCode, Json<TenantContract>), ApiError> {
    request.validate()?;
    TenantContract::validate_period(request.start_date, request.end_date)?;
    TenantRepository::new(state.pool.clone())
        .find_by_id(request.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tenant not found".to_string()))?;

    let currency = request
        .currency
        .clone()
        .unwrap_or_else(|| state.config.billing.currency.clone())
        .to_uppercase();

    let mut tx = state.pool.begin().await?;
    let number = next_number(&mut *tx, NumberSeries::TenantContract, Utc::now().year()).await?;
    let contract = TenantContractRepository::insert(&mut *tx, &number, &request, &currency).await?;
    tx.commit().await?;

    state.audit(
        auth.audit(AuditAction::TenantContractChange)
            .on(contract.id)
            .with_resource_name(contract.contract_number.clone()),
    );
    info!(contract_id = %contract.id, tenant_id = %contract.tenant_id, number = %contract.contract_number, "Tenant contract drafted");
    Ok((StatusCode::CREATED, Json(contract)))
}

/// GET /api/platform/tenant-contracts?tenantId=&status=&page=&size=
pub async fn list_contracts(
    State(state): State<AppState>,
    Query(query): Query<TenantContractQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<TenantContract>>, ApiError> {
    let (contracts, total) = TenantContractRepository::new(state.pool.clone())
        .list(&query, &page)
        .await?;
    Ok(Json(Page::new(contracts, page, total)))
}

/// GET /api/platform/tenant-contracts/:contract_id
pub async fn get_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<TenantContract>, ApiError> {
    Ok(Json(load(&state, contract_id).await?))
}

/// POST /api/platform/tenant-contracts/:contract_id/send
pub async fn send_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<TenantContract>, ApiError> {
    let now = Utc::now();
    let contract = transition(&state, &auth, contract_id, |c| c.send(now)).await?;
    Ok(Json(contract))
}

/// POST /api/platform/tenant-contracts/:contract_id/sign
pub async fn sign_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<SignTenantContractRequest>,
) -> Result<Json<TenantContract>, ApiError> {
    request.validate()?;
    let now = Utc::now();
    let contract =
        transition(&state, &auth, contract_id, |c| c.sign(request.signed_by, now)).await?;
    Ok(Json(contract))
}

/// POST /api/platform/tenant-contracts/:contract_id/activate
pub async fn activate_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<TenantContract>, ApiError> {
    let contract = transition(&state, &auth, contract_id, TenantContract::activate).await?;
    Ok(Json(contract))
}

/// Terminate an active contract early.
///
/// POST /api/platform/tenant-contracts/:contract_id/terminate
pub async fn terminate_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<TerminateTenantContractRequest>,
) -> Result<Json<TenantContract>, ApiError> {
    request.validate()?;
    let reason = request
        .reason
        .ok_or_else(|| ApiError::Validation("A termination reason is required".to_string()))?;
    let now = Utc::now();
    let contract = transition(&state, &auth, contract_id, |c| c.terminate(reason, now)).await?;
    Ok(Json(contract))
}

/// Withdraw a draft or sent contract.
///
/// POST /api/platform/tenant-contracts/:contract_id/cancel
pub async fn cancel_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<TerminateTenantContractRequest>,
) -> Result<Json<TenantContract>, ApiError> {
    request.validate()?;
    let now = Utc::now();
    let contract =
        transition(&state, &auth, contract_id, |c| c.cancel(request.reason, now)).await?;
    Ok(Json(contract))
}
