//! Churn models, ingested predictions and retention interventions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use domain::models::churn::{
    AssignInterventionRequest, CreateChurnModelRequest, CreateInterventionRequest,
    InterventionOutcomeRequest, InterventionQuery, ModelMetricsRequest, PredictionOutcomeRequest,
    PredictionQuery, RecordPredictionRequest, RiskDistribution,
};
use domain::models::{AuditAction, ChurnIntervention, ChurnModel, ChurnPrediction, RiskLevel};
use domain::DomainError;
use persistence::repositories::{ChurnRepository, MemberRepository, NewPrediction};
use serde::Deserialize;
use serde_json::json;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};
use crate::routes::classes::ensure_trainer;

const DEFAULT_AT_RISK_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct AtRiskQuery {
    pub limit: Option<i64>,
}

async fn ensure_member(state: &AppState, tenant_id: Uuid, member_id: Uuid) -> Result<(), ApiError> {
    MemberRepository::new(state.pool.clone())
        .find_by_id(tenant_id, member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    Ok(())
}

// Models

/// Register a model. New models start inactive.
///
/// POST /api/churn/models
pub async fn create_model(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateChurnModelRequest>,
) -> Result<(StatusCode, Json<ChurnModel>), ApiError> {
    request.validate()?;
    let model = ChurnRepository::new(state.pool.clone())
        .create_model(auth.tenant()?, &request)
        .await?;
    state.audit(
        auth.audit(AuditAction::ChurnModelChange)
            .on(model.id)
            .with_resource_name(format!("{} {}", model.name, model.version)),
    );
    Ok((StatusCode::CREATED, Json(model)))
}

/// GET /api/churn/models
pub async fn list_models(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Vec<ChurnModel>>, ApiError> {
    let models = ChurnRepository::new(state.pool.clone())
        .list_models(auth.tenant()?)
        .await?;
    Ok(Json(models))
}

/// GET /api/churn/models/active
pub async fn active_model(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<ChurnModel>, ApiError> {
    let model = ChurnRepository::new(state.pool.clone())
        .find_active_model(auth.tenant()?)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active churn model".to_string()))?;
    Ok(Json(model))
}

/// Make this the only active model of the club.
///
/// POST /api/churn/models/:model_id/activate
pub async fn activate_model(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(model_id): Path<Uuid>,
) -> Result<Json<ChurnModel>, ApiError> {
    let tenant_id = auth.tenant()?;
    let model = ChurnRepository::new(state.pool.clone())
        .activate_model(tenant_id, model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Churn model not found".to_string()))?;

    state.audit(
        auth.audit(AuditAction::ChurnModelChange)
            .on(model.id)
            .with_change("isActive", Some("false".into()), Some("true".into())),
    );
    info!(tenant_id = %tenant_id, model_id = %model.id, version = %model.version, "Churn model activated");
    Ok(Json(model))
}

/// PUT /api/churn/models/:model_id/metrics
pub async fn update_model_metrics(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(model_id): Path<Uuid>,
    Json(request): Json<ModelMetricsRequest>,
) -> Result<Json<ChurnModel>, ApiError> {
    request.validate()?;
    let repo = ChurnRepository::new(state.pool.clone());
    let mut model = repo
        .find_model(auth.tenant()?, model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Churn model not found".to_string()))?;
    model.update_metrics(&request, Utc::now());
    Ok(Json(repo.update_model_metrics(&model).await?))
}

// Predictions

/// Store an externally computed score. The risk level is derived from it.
///
/// POST /api/churn/predictions
pub async fn record_prediction(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<RecordPredictionRequest>,
) -> Result<(StatusCode, Json<ChurnPrediction>), ApiError> {
    request.validate()?;
    ChurnPrediction::validate_score(request.churn_score)?;
    let tenant_id = auth.tenant()?;
    ensure_member(&state, tenant_id, request.member_id).await?;

    let repo = ChurnRepository::new(state.pool.clone());
    let model = match request.model_id {
        Some(id) => repo.find_model(tenant_id, id).await?,
        None => repo.find_active_model(tenant_id).await?,
    }
    .ok_or_else(|| ApiError::NotFound("Churn model not found".to_string()))?;

    let now = Utc::now();
    let valid_for = request
        .valid_for_days
        .unwrap_or(state.config.churn.prediction_validity_days);
    let prediction = repo
        .create_prediction(
            tenant_id,
            &NewPrediction {
                member_id: request.member_id,
                model_id: model.id,
                churn_score: request.churn_score,
                risk_level: RiskLevel::from_churn_score(request.churn_score),
                top_risk_factors: request.top_risk_factors.unwrap_or_else(|| json!([])),
                recommended_interventions: request
                    .recommended_interventions
                    .unwrap_or_else(|| json!([])),
                valid_until: now + Duration::days(valid_for),
            },
        )
        .await?;

    info!(
        tenant_id = %tenant_id,
        member_id = %prediction.member_id,
        score = prediction.churn_score,
        risk = %prediction.risk_level,
        "Churn prediction recorded"
    );
    Ok((StatusCode::CREATED, Json(prediction)))
}

/// GET /api/churn/predictions?riskLevel=&memberId=&page=&size=
pub async fn list_predictions(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<PredictionQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<ChurnPrediction>>, ApiError> {
    let (predictions, total) = ChurnRepository::new(state.pool.clone())
        .list_predictions(auth.tenant()?, &query, &page)
        .await?;
    Ok(Json(Page::new(predictions, page, total)))
}

/// GET /api/churn/predictions/:prediction_id
pub async fn get_prediction(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(prediction_id): Path<Uuid>,
) -> Result<Json<ChurnPrediction>, ApiError> {
    let prediction = ChurnRepository::new(state.pool.clone())
        .find_prediction(auth.tenant()?, prediction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Churn prediction not found".to_string()))?;
    Ok(Json(prediction))
}

/// Latest valid HIGH and CRITICAL predictions, highest score first.
///
/// GET /api/churn/at-risk?limit=
pub async fn at_risk_members(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<AtRiskQuery>,
) -> Result<Json<Vec<ChurnPrediction>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_AT_RISK_LIMIT).clamp(1, 500);
    let predictions = ChurnRepository::new(state.pool.clone())
        .at_risk_members(auth.tenant()?, Utc::now(), limit)
        .await?;
    Ok(Json(predictions))
}

/// GET /api/churn/risk-distribution
pub async fn risk_distribution(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<RiskDistribution>, ApiError> {
    let counts = ChurnRepository::new(state.pool.clone())
        .risk_counts(auth.tenant()?, Utc::now())
        .await?;
    Ok(Json(RiskDistribution::from_counts(&counts)))
}

/// POST /api/churn/predictions/:prediction_id/outcome
pub async fn record_prediction_outcome(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(prediction_id): Path<Uuid>,
    Json(request): Json<PredictionOutcomeRequest>,
) -> Result<Json<ChurnPrediction>, ApiError> {
    let repo = ChurnRepository::new(state.pool.clone());
    let mut prediction = repo
        .find_prediction(auth.tenant()?, prediction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Churn prediction not found".to_string()))?;
    prediction.record_outcome(request.outcome, Utc::now())?;
    Ok(Json(repo.update_prediction_outcome(&prediction).await?))
}

// Interventions

/// POST /api/churn/interventions
pub async fn create_intervention(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateInterventionRequest>,
) -> Result<(StatusCode, Json<ChurnIntervention>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    ensure_member(&state, tenant_id, request.member_id).await?;
    let repo = ChurnRepository::new(state.pool.clone());
    if let Some(prediction_id) = request.prediction_id {
        let prediction = repo
            .find_prediction(tenant_id, prediction_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Churn prediction not found".to_string()))?;
        if prediction.member_id != request.member_id {
            return Err(ApiError::Validation(
                "Prediction belongs to a different member".to_string(),
            ));
        }
    }
    if let Some(user_id) = request.assigned_to {
        ensure_trainer(&state, tenant_id, user_id).await?;
    }

    let intervention = repo.create_intervention(tenant_id, &request).await?;
    state.audit(
        auth.audit(AuditAction::ChurnInterventionChange)
            .on(intervention.id)
            .with_resource_name(intervention.intervention_type.to_string()),
    );
    Ok((StatusCode::CREATED, Json(intervention)))
}

/// GET /api/churn/interventions?status=&memberId=&assignedTo=&page=&size=
pub async fn list_interventions(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<InterventionQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<ChurnIntervention>>, ApiError> {
    let (items, total) = ChurnRepository::new(state.pool.clone())
        .list_interventions(auth.tenant()?, &query, &page)
        .await?;
    Ok(Json(Page::new(items, page, total)))
}

async fn load_intervention(
    repo: &ChurnRepository,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<ChurnIntervention, ApiError> {
    repo.find_intervention(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Intervention not found".to_string()))
}

/// GET /api/churn/interventions/:intervention_id
pub async fn get_intervention(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(intervention_id): Path<Uuid>,
) -> Result<Json<ChurnIntervention>, ApiError> {
    let repo = ChurnRepository::new(state.pool.clone());
    Ok(Json(load_intervention(&repo, auth.tenant()?, intervention_id).await?))
}

async fn change_intervention<F>(
    state: &AppState,
    auth: &UserAuth,
    intervention_id: Uuid,
    change: F,
) -> Result<ChurnIntervention, ApiError>
where
    F: FnOnce(&mut ChurnIntervention) -> Result<(), DomainError>,
{
    let repo = ChurnRepository::new(state.pool.clone());
    let mut intervention = load_intervention(&repo, auth.tenant()?, intervention_id).await?;
    let from = intervention.status;
    change(&mut intervention)?;
    let intervention = repo.update_intervention(&intervention).await?;

    if intervention.status != from {
        state.audit(
            auth.audit(AuditAction::ChurnInterventionChange)
                .on(intervention.id)
                .with_status_change(from, intervention.status),
        );
    }
    Ok(intervention)
}

/// POST /api/churn/interventions/:intervention_id/assign
pub async fn assign_intervention(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(intervention_id): Path<Uuid>,
    Json(request): Json<AssignInterventionRequest>,
) -> Result<Json<ChurnIntervention>, ApiError> {
    ensure_trainer(&state, auth.tenant()?, request.user_id).await?;
    let intervention =
        change_intervention(&state, &auth, intervention_id, |i| i.assign(request.user_id)).await?;
    Ok(Json(intervention))
}

/// POST /api/churn/interventions/:intervention_id/execute
pub async fn execute_intervention(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(intervention_id): Path<Uuid>,
) -> Result<Json<ChurnIntervention>, ApiError> {
    let now = Utc::now();
    let intervention =
        change_intervention(&state, &auth, intervention_id, |i| i.execute(now)).await?;
    Ok(Json(intervention))
}

/// POST /api/churn/interventions/:intervention_id/outcome
pub async fn record_intervention_outcome(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(intervention_id): Path<Uuid>,
    Json(request): Json<InterventionOutcomeRequest>,
) -> Result<Json<ChurnIntervention>, ApiError> {
    request.validate()?;
    let intervention = change_intervention(&state, &auth, intervention_id, |i| {
        i.record_outcome(request.outcome)
    })
    .await?;
    Ok(Json(intervention))
}

/// POST /api/churn/interventions/:intervention_id/cancel
pub async fn cancel_intervention(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(intervention_id): Path<Uuid>,
) -> Result<Json<ChurnIntervention>, ApiError> {
    let intervention =
        change_intervention(&state, &auth, intervention_id, ChurnIntervention::cancel).await?;
    Ok(Json(intervention))
}

/// DELETE /api/churn/interventions/:intervention_id
pub async fn delete_intervention(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(intervention_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !ChurnRepository::new(state.pool.clone())
        .delete_intervention(auth.tenant()?, intervention_id)
        .await?
    {
        return Err(ApiError::NotFound("Intervention not found".to_string()));
    }
    state.audit(auth.audit(AuditAction::ChurnInterventionChange).on(intervention_id));
    Ok(StatusCode::NO_CONTENT)
}
