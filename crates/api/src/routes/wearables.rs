//! Wearable platform connections, synced activity and sync jobs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use domain::models::sync_job::{CompleteSyncJobRequest, FailSyncJobRequest, SyncSource};
use domain::models::wearable::{
    CreateConnectionRequest, DailyActivityRequest, UpdateConnectionRequest, UpdateTokensRequest,
    WearableActivityStats, WearableDailyActivity, WearableWorkout, WearableWorkoutRequest,
    WearableWorkoutStats, ACTIVITY_STATS_DAYS,
};
use domain::models::{AuditAction, SyncJob, WearableConnection, WearablePlatform};
use persistence::repositories::{MemberRepository, SyncJobRepository, WearableRepository};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::services::SyncService;

const DEFAULT_WORKOUT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformsQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

async fn load(
    repo: &WearableRepository,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<WearableConnection, ApiError> {
    repo.find_connection(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Wearable connection not found".to_string()))
}

/// GET /api/wearables/platforms?activeOnly=
pub async fn list_platforms(
    State(state): State<AppState>,
    Query(query): Query<PlatformsQuery>,
) -> Result<Json<Vec<WearablePlatform>>, ApiError> {
    let platforms = WearableRepository::new(state.pool.clone())
        .list_platforms(query.active_only)
        .await?;
    Ok(Json(platforms))
}

/// Link a member to a platform. A member holds one connection per platform.
///
/// POST /api/wearables/connections
pub async fn create_connection(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<WearableConnection>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = WearableRepository::new(state.pool.clone());

    MemberRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    let platform = repo
        .find_platform(request.platform_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Wearable platform not found".to_string()))?;
    if !platform.is_active {
        return Err(ApiError::Conflict(format!(
            "Platform {} is not available",
            platform.code
        )));
    }

    let connection = repo
        .create_connection(tenant_id, &request)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict(format!(
                "Member is already connected to {}",
                platform.name
            )),
            other => other,
        })?;

    state.audit(
        auth.audit(AuditAction::WearableConnectionChange)
            .on(connection.id)
            .with_resource_name(platform.name),
    );
    info!(
        tenant_id = %tenant_id,
        member_id = %connection.member_id,
        connection_id = %connection.id,
        "Wearable connected"
    );

    Ok((StatusCode::CREATED, Json(connection)))
}

/// GET /api/members/:member_id/wearables
pub async fn member_connections(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<WearableConnection>>, ApiError> {
    let connections = WearableRepository::new(state.pool.clone())
        .list_member_connections(auth.tenant()?, member_id)
        .await?;
    Ok(Json(connections))
}

/// GET /api/wearables/connections/:connection_id
pub async fn get_connection(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(connection_id): Path<Uuid>,
) -> Result<Json<WearableConnection>, ApiError> {
    let repo = WearableRepository::new(state.pool.clone());
    Ok(Json(load(&repo, auth.tenant()?, connection_id).await?))
}

/// PUT /api/wearables/connections/:connection_id
pub async fn update_connection(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(connection_id): Path<Uuid>,
    Json(request): Json<UpdateConnectionRequest>,
) -> Result<Json<WearableConnection>, ApiError> {
    request.validate()?;
    let repo = WearableRepository::new(state.pool.clone());
    let mut connection = load(&repo, auth.tenant()?, connection_id).await?;

    if request.external_user_id.is_some() {
        connection.external_user_id = request.external_user_id;
    }
    if request.external_username.is_some() {
        connection.external_username = request.external_username;
    }
    if let Some(enabled) = request.sync_enabled {
        connection.sync_enabled = enabled;
    }

    Ok(Json(repo.update_connection(&connection).await?))
}

/// PUT /api/wearables/connections/:connection_id/tokens
pub async fn update_tokens(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(connection_id): Path<Uuid>,
    Json(request): Json<UpdateTokensRequest>,
) -> Result<Json<WearableConnection>, ApiError> {
    request.validate()?;
    let repo = WearableRepository::new(state.pool.clone());
    let mut connection = load(&repo, auth.tenant()?, connection_id).await?;
    connection.update_tokens(request.access_token, request.refresh_token, request.expires_at);
    let connection = repo.update_connection(&connection).await?;

    state.audit(
        auth.audit(AuditAction::WearableConnectionChange)
            .on(connection.id)
            .with_change("tokens", None, Some("updated".to_string())),
    );
    Ok(Json(connection))
}

/// Drop the stored tokens and stop syncing; history is kept.
///
/// POST /api/wearables/connections/:connection_id/disconnect
pub async fn disconnect(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(connection_id): Path<Uuid>,
) -> Result<Json<WearableConnection>, ApiError> {
    let repo = WearableRepository::new(state.pool.clone());
    let mut connection = load(&repo, auth.tenant()?, connection_id).await?;
    let from = connection.status;
    connection.disconnect()?;
    let connection = repo.update_connection(&connection).await?;

    state.audit(
        auth.audit(AuditAction::WearableConnectionChange)
            .on(connection.id)
            .with_status_change(from, connection.status),
    );
    Ok(Json(connection))
}

/// DELETE /api/wearables/connections/:connection_id
pub async fn delete_connection(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(connection_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    if !WearableRepository::new(state.pool.clone())
        .delete_connection(tenant_id, connection_id)
        .await?
    {
        return Err(ApiError::NotFound("Wearable connection not found".to_string()));
    }
    state.audit(auth.audit(AuditAction::WearableConnectionChange).on(connection_id));
    Ok(StatusCode::NO_CONTENT)
}

/// Store one day of activity, replacing what was synced for that day before.
///
/// PUT /api/wearables/activities
pub async fn upsert_daily_activity(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<DailyActivityRequest>,
) -> Result<Json<WearableDailyActivity>, ApiError> {
    request.validate()?;
    let repo = WearableRepository::new(state.pool.clone());
    let connection = load(&repo, auth.tenant()?, request.connection_id).await?;
    Ok(Json(repo.upsert_daily_activity(&connection, &request).await?))
}

/// POST /api/wearables/workouts
pub async fn record_workout(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<WearableWorkoutRequest>,
) -> Result<(StatusCode, Json<WearableWorkout>), ApiError> {
    request.validate()?;
    let repo = WearableRepository::new(state.pool.clone());
    let connection = load(&repo, auth.tenant()?, request.connection_id).await?;
    let (workout, created) = repo.record_workout(&connection, &request).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(workout)))
}

/// GET /api/members/:member_id/wearables/workouts?limit=
pub async fn member_workouts(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<WearableWorkout>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_WORKOUT_LIMIT).clamp(1, 500);
    let workouts = WearableRepository::new(state.pool.clone())
        .list_member_workouts(auth.tenant()?, member_id, limit)
        .await?;
    Ok(Json(workouts))
}

/// GET /api/members/:member_id/wearables/workouts/stats
pub async fn member_workout_stats(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<WearableWorkoutStats>, ApiError> {
    let stats = WearableRepository::new(state.pool.clone())
        .member_workout_stats(auth.tenant()?, member_id)
        .await?;
    Ok(Json(stats))
}

/// Activity totals and averages over the last 30 days.
///
/// GET /api/members/:member_id/wearables/activity-stats
pub async fn member_activity_stats(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<WearableActivityStats>, ApiError> {
    let today = Utc::now().date_naive();
    let days = WearableRepository::new(state.pool.clone())
        .member_daily_activities(
            auth.tenant()?,
            member_id,
            today - Duration::days(ACTIVITY_STATS_DAYS),
            today,
        )
        .await?;
    Ok(Json(WearableActivityStats::from_days(&days)))
}

/// POST /api/wearables/connections/:connection_id/sync-jobs
pub async fn start_sync(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(connection_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SyncJob>), ApiError> {
    let job = SyncService::new(state.pool.clone())
        .start(auth.tenant()?, SyncSource::Wearable, connection_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/wearables/connections/:connection_id/sync-jobs
pub async fn list_sync_jobs(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(connection_id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<SyncJob>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_WORKOUT_LIMIT).clamp(1, 500);
    let jobs = SyncJobRepository::new(state.pool.clone())
        .list_for_target(auth.tenant()?, SyncSource::Wearable, connection_id, limit)
        .await?;
    Ok(Json(jobs))
}

/// POST /api/wearables/sync-jobs/:job_id/complete
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
            SyncSource::Wearable,
            job_id,
            request.records_processed,
            Utc::now(),
        )
        .await?;
    Ok(Json(job))
}

/// POST /api/wearables/sync-jobs/:job_id/fail
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
            SyncSource::Wearable,
            job_id,
            request.error_message,
            Utc::now(),
        )
        .await?;
    Ok(Json(job))
}
