//! Platform administration: global settings and maintenance windows.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::platform::{
    CreateMaintenanceWindowRequest, CreateSettingRequest, SettingQuery,
    UpdateMaintenanceWindowRequest, UpdateSettingRequest,
};
use domain::models::{AuditAction, GlobalSetting, MaintenanceWindow};
use persistence::repositories::{PlatformRepository, TenantRepository};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWindowsQuery {
    #[serde(default)]
    pub include_past: bool,
}

// Settings

/// GET /api/platform/settings?category=
pub async fn list_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingQuery>,
) -> Result<Json<Vec<GlobalSetting>>, ApiError> {
    let settings = PlatformRepository::new(state.pool.clone())
        .list_settings(query.category.as_deref())
        .await?;
    Ok(Json(settings))
}

/// GET /api/platform/settings/:key
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GlobalSetting>, ApiError> {
    let setting = PlatformRepository::new(state.pool.clone())
        .find_setting(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Setting {} not found", key)))?;
    Ok(Json(setting))
}

/// POST /api/platform/settings
pub async fn create_setting(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateSettingRequest>,
) -> Result<(StatusCode, Json<GlobalSetting>), ApiError> {
    request.validate()?;
    request.value_type.check(&request.value)?;
    let setting = PlatformRepository::new(state.pool.clone())
        .create_setting(&request, auth.user_id)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict(format!("Setting {} already exists", request.key))
            }
            other => other,
        })?;

    state.audit(
        auth.audit(AuditAction::SettingChange)
            .on(setting.id)
            .with_resource_name(setting.key.clone())
            .with_change("value", None, Some(setting.value.clone())),
    );
    Ok((StatusCode::CREATED, Json(setting)))
}

/// Change a setting's value. The value must parse as the setting's type.
///
/// PUT /api/platform/settings/:key
pub async fn update_setting(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(key): Path<String>,
    Json(request): Json<UpdateSettingRequest>,
) -> Result<Json<GlobalSetting>, ApiError> {
    request.validate()?;
    let repo = PlatformRepository::new(state.pool.clone());
    let mut setting = repo
        .find_setting(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Setting {} not found", key)))?;
    let old = setting.value.clone();
    setting.update_value(request.value, auth.user_id)?;
    let setting = repo.update_setting(&setting).await?;

    state.audit(
        auth.audit(AuditAction::SettingChange)
            .on(setting.id)
            .with_resource_name(setting.key.clone())
            .with_change("value", Some(old), Some(setting.value.clone())),
    );
    info!(key = %setting.key, "Global setting updated");
    Ok(Json(setting))
}

// Maintenance windows

/// POST /api/platform/maintenance
pub async fn create_window(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateMaintenanceWindowRequest>,
) -> Result<(StatusCode, Json<MaintenanceWindow>), ApiError> {
    request.validate()?;
    MaintenanceWindow::validate_period(request.starts_at, request.ends_at)?;
    if let Some(tenant_id) = request.tenant_id {
        TenantRepository::new(state.pool.clone())
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Tenant not found".to_string()))?;
    }

    let window = PlatformRepository::new(state.pool.clone())
        .create_window(&request, auth.user_id)
        .await?;

    state.audit(
        auth.audit(AuditAction::MaintenanceChange)
            .on(window.id)
            .with_resource_name(window.title.clone()),
    );
    info!(
        window_id = %window.id,
        all_tenants = window.affects_all_tenants(),
        starts_at = %window.starts_at,
        ends_at = %window.ends_at,
        "Maintenance window scheduled"
    );
    Ok((StatusCode::CREATED, Json(window)))
}

/// GET /api/platform/maintenance?includePast=
pub async fn list_windows(
    State(state): State<AppState>,
    Query(query): Query<ListWindowsQuery>,
) -> Result<Json<Vec<MaintenanceWindow>>, ApiError> {
    let windows = PlatformRepository::new(state.pool.clone())
        .list_windows(query.include_past, Utc::now())
        .await?;
    Ok(Json(windows))
}

async fn load_window(state: &AppState, window_id: Uuid) -> Result<MaintenanceWindow, ApiError> {
    PlatformRepository::new(state.pool.clone())
        .find_window(window_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Maintenance window not found".to_string()))
}

/// GET /api/platform/maintenance/:window_id
pub async fn get_window(
    State(state): State<AppState>,
    Path(window_id): Path<Uuid>,
) -> Result<Json<MaintenanceWindow>, ApiError> {
    Ok(Json(load_window(&state, window_id).await?))
}

/// PUT /api/platform/maintenance/:window_id
pub async fn update_window(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(window_id): Path<Uuid>,
    Json(request): Json<UpdateMaintenanceWindowRequest>,
) -> Result<Json<MaintenanceWindow>, ApiError> {
    request.validate()?;
    let mut window = load_window(&state, window_id).await?;
    if request.starts_at.is_some() || request.ends_at.is_some() {
        let starts_at = request.starts_at.unwrap_or(window.starts_at);
        let ends_at = request.ends_at.unwrap_or(window.ends_at);
        window.reschedule(starts_at, ends_at)?;
    }
    if let Some(title) = request.title {
        window.title = title;
    }
    if let Some(message) = request.message {
        window.message = message;
    }
    let window = PlatformRepository::new(state.pool.clone())
        .update_window(&window)
        .await?;

    state.audit(auth.audit(AuditAction::MaintenanceChange).on(window.id));
    Ok(Json(window))
}

/// POST /api/platform/maintenance/:window_id/cancel
pub async fn cancel_window(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(window_id): Path<Uuid>,
) -> Result<Json<MaintenanceWindow>, ApiError> {
    let mut window = load_window(&state, window_id).await?;
    let from = window.status;
    window.cancel()?;
    let window = PlatformRepository::new(state.pool.clone())
        .update_window(&window)
        .await?;

    state.audit(
        auth.audit(AuditAction::MaintenanceChange)
            .on(window.id)
            .with_status_change(from, window.status),
    );
    info!(window_id = %window.id, "Maintenance window cancelled");
    Ok(Json(window))
}

/// The window currently in effect for the caller's club, if any.
///
/// GET /api/maintenance/current
pub async fn current_window(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Option<MaintenanceWindow>>, ApiError> {
    let window = PlatformRepository::new(state.pool.clone())
        .active_window(auth.tenant_id, Utc::now())
        .await?;
    Ok(Json(window))
}
