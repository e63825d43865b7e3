//! Membership plan handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::membership_plan::{CreatePlanRequest, UpdatePlanRequest};
use domain::models::{AuditAction, MembershipPlan};
use persistence::repositories::MembershipPlanRepository;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPlansQuery {
    #[serde(default)]
    pub active_only: bool,
}

async fn load(
    repo: &MembershipPlanRepository,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<MembershipPlan, ApiError> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership plan not found".to_string()))
}

/// Create a membership plan.
///
/// POST /api/plans
pub async fn create_plan(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<MembershipPlan>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let currency = request
        .currency
        .as_deref()
        .unwrap_or(&state.config.billing.currency)
        .to_uppercase();

    let plan = MembershipPlanRepository::new(state.pool.clone())
        .create(tenant_id, &request, &currency)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict(format!("A plan named '{}' already exists", request.name))
            }
            other => other,
        })?;

    state.audit(
        auth.audit(AuditAction::PlanCreate)
            .on(plan.id)
            .with_resource_name(plan.name.clone()),
    );
    info!(tenant_id = %tenant_id, plan_id = %plan.id, "Membership plan created");

    Ok((StatusCode::CREATED, Json(plan)))
}

/// List plans.
///
/// GET /api/plans?activeOnly=
pub async fn list_plans(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListPlansQuery>,
) -> Result<Json<Vec<MembershipPlan>>, ApiError> {
    let plans = MembershipPlanRepository::new(state.pool.clone())
        .list(auth.tenant()?, query.active_only)
        .await?;
    Ok(Json(plans))
}

/// Get a plan.
///
/// GET /api/plans/:plan_id
pub async fn get_plan(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<MembershipPlan>, ApiError> {
    let repo = MembershipPlanRepository::new(state.pool.clone());
    Ok(Json(load(&repo, auth.tenant()?, plan_id).await?))
}

/// Update a plan. Existing subscriptions keep the limits they were created with.
///
/// PUT /api/plans/:plan_id
pub async fn update_plan(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<UpdatePlanRequest>,
) -> Result<Json<MembershipPlan>, ApiError> {
    request.validate()?;
    let repo = MembershipPlanRepository::new(state.pool.clone());
    let mut plan = load(&repo, auth.tenant()?, plan_id).await?;

    if let Some(name) = request.name {
        plan.name = name;
    }
    if request.description.is_some() {
        plan.description = request.description;
    }
    if let Some(price) = request.price {
        plan.price = price;
    }
    if let Some(duration_days) = request.duration_days {
        plan.duration_days = duration_days;
    }
    if let Some(days) = request.freeze_days_allowed {
        plan.freeze_days_allowed = days;
    }
    if let Some(passes) = request.guest_passes {
        plan.guest_passes = passes;
    }

    let plan = repo.update(&plan).await?;
    state.audit(auth.audit(AuditAction::PlanUpdate).on(plan.id));

    Ok(Json(plan))
}

/// Make a plan available for new subscriptions.
///
/// POST /api/plans/:plan_id/activate
pub async fn activate_plan(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<MembershipPlan>, ApiError> {
    let repo = MembershipPlanRepository::new(state.pool.clone());
    let mut plan = load(&repo, auth.tenant()?, plan_id).await?;
    plan.activate()?;
    let plan = repo.update(&plan).await?;
    state.audit(
        auth.audit(AuditAction::PlanUpdate)
            .on(plan.id)
            .with_status_change("INACTIVE", "ACTIVE"),
    );
    Ok(Json(plan))
}

/// Withdraw a plan from sale.
///
/// POST /api/plans/:plan_id/deactivate
pub async fn deactivate_plan(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<MembershipPlan>, ApiError> {
    let repo = MembershipPlanRepository::new(state.pool.clone());
    let mut plan = load(&repo, auth.tenant()?, plan_id).await?;
    plan.deactivate()?;
    let plan = repo.update(&plan).await?;
    state.audit(
        auth.audit(AuditAction::PlanUpdate)
            .on(plan.id)
            .with_status_change("ACTIVE", "INACTIVE"),
    );
    Ok(Json(plan))
}

/// Delete a plan that no subscription references.
///
/// DELETE /api/plans/:plan_id
pub async fn delete_plan(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(plan_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = MembershipPlanRepository::new(state.pool.clone());
    load(&repo, tenant_id, plan_id).await?;

    if repo.count_subscriptions(tenant_id, plan_id).await? > 0 {
        return Err(ApiError::Conflict(
            "Plan has subscriptions; deactivate it instead".to_string(),
        ));
    }
    repo.delete(tenant_id, plan_id).await?;

    state.audit(auth.audit(AuditAction::PlanDelete).on(plan_id));
    info!(tenant_id = %tenant_id, plan_id = %plan_id, "Membership plan deleted");

    Ok(StatusCode::NO_CONTENT)
}
