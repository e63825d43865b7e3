//! Class pack and member credit balance handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::class_pack::{
    CreateClassPackRequest, GrantBalanceRequest, UpdateClassPackRequest,
};
use domain::models::{AuditAction, ClassPack, ClassPackBalance, ClassPackBalanceStatus};
use domain::DomainError;
use persistence::repositories::{ClassPackRepository, MemberRepository};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPacksQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub member_id: Uuid,
    pub remaining_credits: i64,
}

async fn load(repo: &ClassPackRepository, tenant_id: Uuid, id: Uuid) -> Result<ClassPack, ApiError> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class pack not found".to_string()))
}

async fn load_balance(
    repo: &ClassPackRepository,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<ClassPackBalance, ApiError> {
    repo.find_balance(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class pack balance not found".to_string()))
}

/// POST /api/class-packs
pub async fn create_pack(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateClassPackRequest>,
) -> Result<(StatusCode, Json<ClassPack>), ApiError> {
    request.validate()?;
    ClassPack::validate_terms(request.class_count, request.price)?;
    let tenant_id = auth.tenant()?;

    let pack = ClassPackRepository::new(state.pool.clone())
        .create(tenant_id, &request)
        .await?;

    state.audit(
        auth.audit(AuditAction::ClassPackCreate)
            .on(pack.id)
            .with_resource_name(pack.name.clone()),
    );
    info!(tenant_id = %tenant_id, pack_id = %pack.id, "Class pack created");

    Ok((StatusCode::CREATED, Json(pack)))
}

/// GET /api/class-packs?activeOnly=
pub async fn list_packs(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListPacksQuery>,
) -> Result<Json<Vec<ClassPack>>, ApiError> {
    let packs = ClassPackRepository::new(state.pool.clone())
        .list(auth.tenant()?, query.active_only)
        .await?;
    Ok(Json(packs))
}

/// GET /api/class-packs/:pack_id
pub async fn get_pack(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(pack_id): Path<Uuid>,
) -> Result<Json<ClassPack>, ApiError> {
    let repo = ClassPackRepository::new(state.pool.clone());
    Ok(Json(load(&repo, auth.tenant()?, pack_id).await?))
}

/// PUT /api/class-packs/:pack_id
pub async fn update_pack(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(pack_id): Path<Uuid>,
    Json(request): Json<UpdateClassPackRequest>,
) -> Result<Json<ClassPack>, ApiError> {
    request.validate()?;
    let repo = ClassPackRepository::new(state.pool.clone());
    let mut pack = load(&repo, auth.tenant()?, pack_id).await?;

    if let Some(name) = request.name {
        pack.name = name;
    }
    if request.description.is_some() {
        pack.description = request.description;
    }
    if let Some(count) = request.class_count {
        pack.class_count = count;
    }
    if let Some(price) = request.price {
        pack.price = price;
    }
    if request.validity_days.is_some() {
        pack.validity_days = request.validity_days;
    }
    ClassPack::validate_terms(pack.class_count, pack.price)?;

    let pack = repo.update(&pack).await?;
    state.audit(auth.audit(AuditAction::ClassPackUpdate).on(pack.id));

    Ok(Json(pack))
}

async fn toggle(
    state: &AppState,
    auth: &UserAuth,
    pack_id: Uuid,
    change: fn(&mut ClassPack) -> Result<(), DomainError>,
) -> Result<ClassPack, ApiError> {
    let repo = ClassPackRepository::new(state.pool.clone());
    let mut pack = load(&repo, auth.tenant()?, pack_id).await?;
    change(&mut pack)?;
    let pack = repo.update(&pack).await?;
    state.audit(
        auth.audit(AuditAction::ClassPackUpdate)
            .on(pack.id)
            .with_change(
                "isActive",
                Some((!pack.is_active).to_string()),
                Some(pack.is_active.to_string()),
            ),
    );
    Ok(pack)
}

/// POST /api/class-packs/:pack_id/activate
pub async fn activate_pack(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(pack_id): Path<Uuid>,
) -> Result<Json<ClassPack>, ApiError> {
    Ok(Json(toggle(&state, &auth, pack_id, ClassPack::activate).await?))
}

/// POST /api/class-packs/:pack_id/deactivate
pub async fn deactivate_pack(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(pack_id): Path<Uuid>,
) -> Result<Json<ClassPack>, ApiError> {
    Ok(Json(toggle(&state, &auth, pack_id, ClassPack::deactivate).await?))
}

/// Delete an inactive pack that no member holds credits from.
///
/// DELETE /api/class-packs/:pack_id
pub async fn delete_pack(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(pack_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = ClassPackRepository::new(state.pool.clone());
    let pack = load(&repo, tenant_id, pack_id).await?;
    let with_credits = repo.count_balances_with_credits(tenant_id, pack_id).await?;
    pack.ensure_deletable(with_credits)?;
    repo.delete(tenant_id, pack_id).await?;

    state.audit(auth.audit(AuditAction::ClassPackDelete).on(pack_id));
    info!(tenant_id = %tenant_id, pack_id = %pack_id, "Class pack deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Grant a member the credits of an active pack.
///
/// POST /api/class-packs/balances
pub async fn grant_balance(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<GrantBalanceRequest>,
) -> Result<(StatusCode, Json<ClassPackBalance>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = ClassPackRepository::new(state.pool.clone());
    let pack = load(&repo, tenant_id, request.class_pack_id).await?;
    if !pack.is_active {
        return Err(ApiError::Conflict("Class pack is not active".to_string()));
    }
    MemberRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    let balance = repo.grant_balance(&pack, request.member_id, Utc::now()).await?;

    state.audit(
        auth.audit(AuditAction::ClassPackGrant)
            .on(balance.id)
            .with_resource_name(pack.name.clone()),
    );
    info!(
        tenant_id = %tenant_id,
        member_id = %request.member_id,
        balance_id = %balance.id,
        credits = balance.classes_remaining,
        "Class pack granted"
    );

    Ok((StatusCode::CREATED, Json(balance)))
}

/// GET /api/class-packs/balances/:balance_id
pub async fn get_balance(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(balance_id): Path<Uuid>,
) -> Result<Json<ClassPackBalance>, ApiError> {
    let repo = ClassPackRepository::new(state.pool.clone());
    Ok(Json(load_balance(&repo, auth.tenant()?, balance_id).await?))
}

async fn change_balance<F>(
    state: &AppState,
    auth: &UserAuth,
    balance_id: Uuid,
    change: F,
) -> Result<(ClassPackBalanceStatus, ClassPackBalance), ApiError>
where
    F: FnOnce(&mut ClassPackBalance) -> Result<(), DomainError>,
{
    let repo = ClassPackRepository::new(state.pool.clone());
    let mut balance = load_balance(&repo, auth.tenant()?, balance_id).await?;
    let from = balance.status;
    change(&mut balance)?;
    Ok((from, repo.update_balance(&balance).await?))
}

/// POST /api/class-packs/balances/:balance_id/use
pub async fn use_credit(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(balance_id): Path<Uuid>,
) -> Result<Json<ClassPackBalance>, ApiError> {
    let now = Utc::now();
    let (_, balance) = change_balance(&state, &auth, balance_id, |b| b.use_credit(now)).await?;
    Ok(Json(balance))
}

/// POST /api/class-packs/balances/:balance_id/refund
pub async fn refund_credit(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(balance_id): Path<Uuid>,
) -> Result<Json<ClassPackBalance>, ApiError> {
    let (_, balance) =
        change_balance(&state, &auth, balance_id, ClassPackBalance::refund_credit).await?;
    Ok(Json(balance))
}

/// POST /api/class-packs/balances/:balance_id/cancel
pub async fn cancel_balance(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(balance_id): Path<Uuid>,
) -> Result<Json<ClassPackBalance>, ApiError> {
    let (from, balance) =
        change_balance(&state, &auth, balance_id, ClassPackBalance::cancel).await?;
    state.audit(
        auth.audit(AuditAction::ClassPackUpdate)
            .on(balance.id)
            .with_status_change(from, balance.status),
    );
    Ok(Json(balance))
}

/// GET /api/members/:member_id/class-packs
pub async fn member_balances(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<ClassPackBalance>>, ApiError> {
    let balances = ClassPackRepository::new(state.pool.clone())
        .list_balances_for_member(auth.tenant()?, member_id)
        .await?;
    Ok(Json(balances))
}

/// Usable credits across the member's unexpired balances.
///
/// GET /api/members/:member_id/class-packs/credits
pub async fn member_credits(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<CreditSummary>, ApiError> {
    let remaining_credits = ClassPackRepository::new(state.pool.clone())
        .total_remaining_credits(auth.tenant()?, member_id, Utc::now())
        .await?;
    Ok(Json(CreditSummary {
        member_id,
        remaining_credits,
    }))
}
