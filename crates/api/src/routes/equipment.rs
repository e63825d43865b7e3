//! Connected gym equipment: provider configs, units, workouts and sync jobs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::equipment::{
    CreateEquipmentUnitRequest, CreateProviderConfigRequest, EquipmentUnitQuery,
    OAuthTokensRequest, RecordWorkoutRequest, UpdateEquipmentUnitRequest,
    UpdateProviderConfigRequest, WorkoutStats,
};
use domain::models::sync_job::{CompleteSyncJobRequest, FailSyncJobRequest, SyncSource};
use domain::models::{
    AuditAction, EquipmentProvider, EquipmentProviderConfig, EquipmentUnit, EquipmentWorkout,
    SyncJob,
};
use persistence::repositories::{EquipmentRepository, MemberRepository, SyncJobRepository};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::routes::classes::ensure_location;
use crate::services::SyncService;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct WorkoutsQuery {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

async fn load_config(
    repo: &EquipmentRepository,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<EquipmentProviderConfig, ApiError> {
    repo.find_config(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Provider config not found".to_string()))
}

async fn load_unit(
    repo: &EquipmentRepository,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<EquipmentUnit, ApiError> {
    repo.find_unit(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Equipment unit not found".to_string()))
}

/// GET /api/equipment/providers?activeOnly=
pub async fn list_providers(
    State(state): State<AppState>,
    Query(query): Query<ProvidersQuery>,
) -> Result<Json<Vec<EquipmentProvider>>, ApiError> {
    let providers = EquipmentRepository::new(state.pool.clone())
        .list_providers(query.active_only)
        .await?;
    Ok(Json(providers))
}

// Provider configs

/// Connect the club to a provider. One config per provider.
///
/// POST /api/equipment/configs
pub async fn create_config(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateProviderConfigRequest>,
) -> Result<(StatusCode, Json<EquipmentProviderConfig>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = EquipmentRepository::new(state.pool.clone());

    let provider = repo
        .find_provider(request.provider_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Equipment provider not found".to_string()))?;
    if !provider.is_active {
        return Err(ApiError::Conflict(format!(
            "Provider {} is not available",
            provider.code
        )));
    }
    if repo.config_exists_for_provider(tenant_id, provider.id).await? {
        return Err(ApiError::Conflict(format!(
            "Provider {} is already configured",
            provider.code
        )));
    }

    let config = repo.create_config(tenant_id, &request).await?;
    state.audit(
        auth.audit(AuditAction::EquipmentConfigChange)
            .on(config.id)
            .with_resource_name(provider.name),
    );
    info!(tenant_id = %tenant_id, config_id = %config.id, provider = %provider.code, "Equipment provider configured");

    Ok((StatusCode::CREATED, Json(config)))
}

/// GET /api/equipment/configs
pub async fn list_configs(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Vec<EquipmentProviderConfig>>, ApiError> {
    let configs = EquipmentRepository::new(state.pool.clone())
        .list_configs(auth.tenant()?)
        .await?;
    Ok(Json(configs))
}

/// GET /api/equipment/configs/:config_id
pub async fn get_config(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(config_id): Path<Uuid>,
) -> Result<Json<EquipmentProviderConfig>, ApiError> {
    let repo = EquipmentRepository::new(state.pool.clone());
    Ok(Json(load_config(&repo, auth.tenant()?, config_id).await?))
}

/// PUT /api/equipment/configs/:config_id
pub async fn update_config(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(config_id): Path<Uuid>,
    Json(request): Json<UpdateProviderConfigRequest>,
) -> Result<Json<EquipmentProviderConfig>, ApiError> {
    request.validate()?;
    let repo = EquipmentRepository::new(state.pool.clone());
    let mut config = load_config(&repo, auth.tenant()?, config_id).await?;

    if request.api_key.is_some() {
        config.api_key = request.api_key;
    }
    if request.api_secret.is_some() {
        config.api_secret = request.api_secret;
    }
    if let Some(settings) = request.settings {
        config.settings = settings;
    }
    if let Some(enabled) = request.sync_enabled {
        config.sync_enabled = enabled;
    }
    if let Some(minutes) = request.sync_interval_minutes {
        config.sync_interval_minutes = minutes;
    }
    if let Some(status) = request.status {
        config.status = status;
    }

    let config = repo.update_config(&config).await?;
    state.audit(auth.audit(AuditAction::EquipmentConfigChange).on(config.id));
    Ok(Json(config))
}

/// Store tokens obtained from the provider's OAuth flow.
///
/// PUT /api/equipment/configs/:config_id/oauth-tokens
pub async fn set_oauth_tokens(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(config_id): Path<Uuid>,
    Json(request): Json<OAuthTokensRequest>,
) -> Result<Json<EquipmentProviderConfig>, ApiError> {
    request.validate()?;
    let repo = EquipmentRepository::new(state.pool.clone());
    let mut config = load_config(&repo, auth.tenant()?, config_id).await?;
    config.set_oauth_tokens(request.access_token, request.refresh_token, request.expires_at);
    let config = repo.update_config(&config).await?;

    state.audit(
        auth.audit(AuditAction::EquipmentConfigChange)
            .on(config.id)
            .with_change("oauthTokens", None, Some("updated".to_string())),
    );
    Ok(Json(config))
}

/// DELETE /api/equipment/configs/:config_id
pub async fn delete_config(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(config_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    if !EquipmentRepository::new(state.pool.clone())
        .delete_config(tenant_id, config_id)
        .await?
    {
        return Err(ApiError::NotFound("Provider config not found".to_string()));
    }
    state.audit(auth.audit(AuditAction::EquipmentConfigChange).on(config_id));
    info!(tenant_id = %tenant_id, config_id = %config_id, "Equipment provider config deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Units

/// POST /api/equipment/units
pub async fn create_unit(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateEquipmentUnitRequest>,
) -> Result<(StatusCode, Json<EquipmentUnit>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = EquipmentRepository::new(state.pool.clone());
    load_config(&repo, tenant_id, request.provider_config_id).await?;
    ensure_location(&state, tenant_id, request.location_id).await?;

    let unit = repo.create_unit(tenant_id, &request).await?;
    info!(tenant_id = %tenant_id, unit_id = %unit.id, "Equipment unit registered");
    Ok((StatusCode::CREATED, Json(unit)))
}

/// GET /api/equipment/units?locationId=&equipmentType=
pub async fn list_units(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<EquipmentUnitQuery>,
) -> Result<Json<Vec<EquipmentUnit>>, ApiError> {
    let units = EquipmentRepository::new(state.pool.clone())
        .list_units(auth.tenant()?, &query)
        .await?;
    Ok(Json(units))
}

/// GET /api/equipment/units/:unit_id
pub async fn get_unit(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<EquipmentUnit>, ApiError> {
    let repo = EquipmentRepository::new(state.pool.clone());
    Ok(Json(load_unit(&repo, auth.tenant()?, unit_id).await?))
}

/// PUT /api/equipment/units/:unit_id
pub async fn update_unit(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(unit_id): Path<Uuid>,
    Json(request): Json<UpdateEquipmentUnitRequest>,
) -> Result<Json<EquipmentUnit>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = EquipmentRepository::new(state.pool.clone());
    let mut unit = load_unit(&repo, tenant_id, unit_id).await?;

    if let Some(location_id) = request.location_id {
        ensure_location(&state, tenant_id, location_id).await?;
        unit.location_id = location_id;
    }
    if let Some(name) = request.name {
        unit.name = name;
    }
    if let Some(kind) = request.equipment_type {
        unit.equipment_type = kind;
    }
    if request.model.is_some() {
        unit.model = request.model;
    }
    if request.serial_number.is_some() {
        unit.serial_number = request.serial_number;
    }

    Ok(Json(repo.update_unit(&unit).await?))
}

async fn set_connected(
    state: &AppState,
    auth: &UserAuth,
    unit_id: Uuid,
    connected: bool,
) -> Result<EquipmentUnit, ApiError> {
    let repo = EquipmentRepository::new(state.pool.clone());
    let mut unit = load_unit(&repo, auth.tenant()?, unit_id).await?;
    if connected {
        unit.mark_connected(Utc::now());
    } else {
        unit.mark_disconnected();
    }
    Ok(repo.update_unit(&unit).await?)
}

/// POST /api/equipment/units/:unit_id/connected
pub async fn mark_connected(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<EquipmentUnit>, ApiError> {
    Ok(Json(set_connected(&state, &auth, unit_id, true).await?))
}

/// POST /api/equipment/units/:unit_id/disconnected
pub async fn mark_disconnected(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<EquipmentUnit>, ApiError> {
    Ok(Json(set_connected(&state, &auth, unit_id, false).await?))
}

/// DELETE /api/equipment/units/:unit_id
pub async fn delete_unit(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(unit_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !EquipmentRepository::new(state.pool.clone())
        .delete_unit(auth.tenant()?, unit_id)
        .await?
    {
        return Err(ApiError::NotFound("Equipment unit not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

// Workouts

/// Ingest a workout. Re-sending a known external id returns the stored workout with 200.
///
/// POST /api/equipment/workouts
pub async fn record_workout(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<RecordWorkoutRequest>,
) -> Result<(StatusCode, Json<EquipmentWorkout>), ApiError> {
    request.validate()?;
    request.ensure_not_in_future(Utc::now())?;
    let tenant_id = auth.tenant()?;
    let repo = EquipmentRepository::new(state.pool.clone());

    MemberRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    load_config(&repo, tenant_id, request.provider_config_id).await?;
    if let Some(unit_id) = request.unit_id {
        load_unit(&repo, tenant_id, unit_id).await?;
    }

    let (workout, created) = repo.record_workout(tenant_id, &request).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(workout)))
}

/// GET /api/members/:member_id/equipment/workouts?since=&limit=
pub async fn member_workouts(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
    Query(query): Query<WorkoutsQuery>,
) -> Result<Json<Vec<EquipmentWorkout>>, ApiError> {
    let workouts = EquipmentRepository::new(state.pool.clone())
        .list_member_workouts(auth.tenant()?, member_id, query.since, clamp_limit(query.limit))
        .await?;
    Ok(Json(workouts))
}

/// GET /api/members/:member_id/equipment/stats
pub async fn member_stats(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<WorkoutStats>, ApiError> {
    let stats = EquipmentRepository::new(state.pool.clone())
        .member_workout_stats(auth.tenant()?, member_id)
        .await?;
    Ok(Json(stats))
}

// Sync jobs

/// POST /api/equipment/configs/:config_id/sync-jobs
pub async fn start_sync(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(config_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SyncJob>), ApiError> {
    let job = SyncService::new(state.pool.clone())
        .start(auth.tenant()?, SyncSource::Equipment, config_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/equipment/configs/:config_id/sync-jobs?limit=
pub async fn list_sync_jobs(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(config_id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<SyncJob>>, ApiError> {
    let jobs = SyncJobRepository::new(state.pool.clone())
        .list_for_target(
            auth.tenant()?,
            SyncSource::Equipment,
            config_id,
            clamp_limit(query.limit),
        )
        .await?;
    Ok(Json(jobs))
}

/// GET /api/equipment/configs/:config_id/sync-jobs/latest
pub async fn latest_sync_job(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(config_id): Path<Uuid>,
) -> Result<Json<SyncJob>, ApiError> {
    let job = SyncJobRepository::new(state.pool.clone())
        .latest_for_target(auth.tenant()?, SyncSource::Equipment, config_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No sync job for this config".to_string()))?;
    Ok(Json(job))
}

/// GET /api/equipment/sync-jobs/:job_id
pub async fn get_sync_job(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SyncJob>, ApiError> {
    let job = SyncJobRepository::new(state.pool.clone())
        .find_by_id(auth.tenant()?, SyncSource::Equipment, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Sync job not found".to_string()))?;
    Ok(Json(job))
}

/// POST /api/equipment/sync-jobs/:job_id/complete
pub async fn complete_sync_job(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(job_id): Path<Uuid>,
    Json(request): Json<CompleteSyncJobRequest>,
) -> Result<Json<SyncJob>, ApiError> {
    request.validate()?;
    let job = SyncService::new(state.pool.clone())
        .complete(
            auth.tenant()?,
            SyncSource::Equipment,
            job_id,
            request.records_processed,
            Utc::now(),
        )
        .await?;
    Ok(Json(job))
}

/// POST /api/equipment/sync-jobs/:job_id/fail
pub async fn fail_sync_job(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(job_id): Path<Uuid>,
    Json(request): Json<FailSyncJobRequest>,
) -> Result<Json<SyncJob>, ApiError> {
    request.validate()?;
    let job = SyncService::new(state.pool.clone())
        .fail(
            auth.tenant()?,
            SyncSource::Equipment,
            job_id,
            request.error_message,
            Utc::now(),
        )
        .await?;
    Ok(Json(job))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(42)), 42);
    }
}
