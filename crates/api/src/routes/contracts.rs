//! Membership contract handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, NaiveDate, Utc};
use domain::models::contract::{
    ContractCancellationRequest, CreateContractRequest, TerminationQuote,
};
use domain::models::{AuditAction, ContractStatus, MembershipContract};
use domain::DomainError;
use persistence::repositories::{
    next_number, ContractRepository, MemberRepository, MembershipPlanRepository, NumberSeries,
};
use serde::Deserialize;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContractsQuery {
    pub member_id: Option<Uuid>,
    pub status: Option<ContractStatus>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn load(
    state: &AppState,
    tenant_id: Uuid,
    contract_id: Uuid,
) -> Result<MembershipContract, ApiError> {
    ContractRepository::new(state.pool.clone())
        .find_by_id(tenant_id, contract_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contract not found".to_string()))
}

async fn transition<F>(
    state: &AppState,
    auth: &UserAuth,
    contract_id: Uuid,
    change: F,
) -> Result<MembershipContract, ApiError>
where
    F: FnOnce(&mut MembershipContract) -> Result<(), DomainError>,
{
    let tenant_id = auth.tenant()?;
    let mut contract = load(state, tenant_id, contract_id).await?;
    let from = contract.status;
    change(&mut contract)?;
    let contract = ContractRepository::new(state.pool.clone())
        .update(&contract)
        .await?;

    state.audit(
        auth.audit(AuditAction::ContractStatusChange)
            .on(contract.id)
            .with_resource_name(contract.contract_number.clone())
            .with_status_change(from, contract.status),
    );
    info!(
        tenant_id = %tenant_id,
        contract_id = %contract.id,
        from = %from,
        to = %contract.status,
        "Contract status changed"
    );
    Ok(contract)
}

/// Draft a contract numbered `CON-{year}-{seq}`. It awaits the member's signature.
///
/// POST /api/contracts
pub async fn create_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateContractRequest>,
) -> Result<(StatusCode, Json<MembershipContract>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;

    MemberRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    MembershipPlanRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.plan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership plan not found".to_string()))?;

    let mut tx = state.pool.begin().await?;
    let number = next_number(
        &mut *tx,
        NumberSeries::MembershipContract(tenant_id),
        today().year(),
    )
    .await?;
    let contract = ContractRepository::insert(&mut *tx, tenant_id, &number, &request).await?;
    tx.commit().await?;

    state.audit(
        auth.audit(AuditAction::ContractCreate)
            .on(contract.id)
            .with_resource_name(contract.contract_number.clone()),
    );
    info!(
        tenant_id = %tenant_id,
        contract_id = %contract.id,
        contract_number = %contract.contract_number,
        "Contract created"
    );

    Ok((StatusCode::CREATED, Json(contract)))
}

/// GET /api/contracts?memberId=&status=&page=&size=
pub async fn list_contracts(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListContractsQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<MembershipContract>>, ApiError> {
    let (contracts, total) = ContractRepository::new(state.pool.clone())
        .list(auth.tenant()?, query.member_id, query.status, &page)
        .await?;
    Ok(Json(Page::new(contracts, page, total)))
}

/// GET /api/contracts/:contract_id
pub async fn get_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<MembershipContract>, ApiError> {
    Ok(Json(load(&state, auth.tenant()?, contract_id).await?))
}

/// POST /api/contracts/:contract_id/sign
pub async fn sign_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<MembershipContract>, ApiError> {
    let now = Utc::now();
    let contract = transition(&state, &auth, contract_id, |c| c.sign(now)).await?;
    Ok(Json(contract))
}

/// Void a contract inside its cooling-off period, free of charge.
///
/// POST /api/contracts/:contract_id/void
pub async fn void_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<ContractCancellationRequest>,
) -> Result<Json<MembershipContract>, ApiError> {
    request.validate()?;
    let today = today();
    let contract = transition(&state, &auth, contract_id, |c| {
        c.cancel_within_cooling_off(today, request.reason)
    })
    .await?;
    Ok(Json(contract))
}

/// Give notice. The contract ends after its notice period.
///
/// POST /api/contracts/:contract_id/request-cancellation
pub async fn request_cancellation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<ContractCancellationRequest>,
) -> Result<Json<MembershipContract>, ApiError> {
    request.validate()?;
    let today = today();
    let contract = transition(&state, &auth, contract_id, |c| {
        c.request_cancellation(today, request.reason).map(|_| ())
    })
    .await?;
    Ok(Json(contract))
}

/// POST /api/contracts/:contract_id/complete-cancellation
pub async fn complete_cancellation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<MembershipContract>, ApiError> {
    let today = today();
    let contract = transition(&state, &auth, contract_id, |c| c.complete_cancellation(today)).await?;
    Ok(Json(contract))
}

/// POST /api/contracts/:contract_id/withdraw-cancellation
pub async fn withdraw_cancellation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<MembershipContract>, ApiError> {
    let contract = transition(&state, &auth, contract_id, MembershipContract::withdraw_cancellation).await?;
    Ok(Json(contract))
}

/// POST /api/contracts/:contract_id/suspend
pub async fn suspend_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<MembershipContract>, ApiError> {
    let contract = transition(&state, &auth, contract_id, MembershipContract::suspend).await?;
    Ok(Json(contract))
}

/// POST /api/contracts/:contract_id/reactivate
pub async fn reactivate_contract(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<MembershipContract>, ApiError> {
    let contract = transition(&state, &auth, contract_id, MembershipContract::reactivate).await?;
    Ok(Json(contract))
}

/// What ending the contract today would cost.
///
/// GET /api/contracts/:contract_id/termination-quote
pub async fn termination_quote(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<TerminationQuote>, ApiError> {
    let contract = load(&state, auth.tenant()?, contract_id).await?;
    let today = today();
    let within_cooling_off = contract.is_within_cooling_off(today);

    Ok(Json(TerminationQuote {
        contract_id: contract.id,
        within_cooling_off,
        within_commitment: contract.is_within_commitment(today),
        months_remaining: contract.commitment_months_remaining(today),
        fee: if within_cooling_off {
            0
        } else {
            contract.early_termination_fee(today)?
        },
    }))
}
