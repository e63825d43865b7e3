//! Club location handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::attendance::{CreateLocationRequest, UpdateLocationRequest};
use domain::models::{AuditAction, Location};
use persistence::repositories::LocationRepository;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// Create a location.
///
/// POST /api/locations
pub async fn create_location(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;

    let location = LocationRepository::new(state.pool.clone())
        .create(tenant_id, &request)
        .await?;

    state.audit(
        auth.audit(AuditAction::LocationCreate)
            .on(location.id)
            .with_resource_name(location.name.clone()),
    );
    info!(tenant_id = %tenant_id, location_id = %location.id, "Location created");

    Ok((StatusCode::CREATED, Json(location)))
}

/// GET /api/locations?activeOnly=
pub async fn list_locations(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListLocationsQuery>,
) -> Result<Json<Vec<Location>>, ApiError> {
    let locations = LocationRepository::new(state.pool.clone())
        .list(auth.tenant()?, query.active_only)
        .await?;
    Ok(Json(locations))
}

/// GET /api/locations/:location_id
pub async fn get_location(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(location_id): Path<Uuid>,
) -> Result<Json<Location>, ApiError> {
    let location = LocationRepository::new(state.pool.clone())
        .find_by_id(auth.tenant()?, location_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Location not found".to_string()))?;
    Ok(Json(location))
}

/// Update a location. Setting `isActive` to false stops check-ins there.
///
/// PUT /api/locations/:location_id
pub async fn update_location(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(location_id): Path<Uuid>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<Location>, ApiError> {
    request.validate()?;
    let repo = LocationRepository::new(state.pool.clone());
    let mut location = repo
        .find_by_id(auth.tenant()?, location_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Location not found".to_string()))?;

    if let Some(name) = request.name {
        location.name = name;
    }
    if request.address.is_some() {
        location.address = request.address;
    }
    if request.capacity.is_some() {
        location.capacity = request.capacity;
    }
    if let Some(is_active) = request.is_active {
        location.is_active = is_active;
    }

    let location = repo.update(&location).await?;
    state.audit(auth.audit(AuditAction::LocationUpdate).on(location.id));

    Ok(Json(location))
}

/// DELETE /api/locations/:location_id
pub async fn delete_location(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(location_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let deleted = LocationRepository::new(state.pool.clone())
        .delete(tenant_id, location_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Location not found".to_string()));
    }

    state.audit(auth.audit(AuditAction::LocationDelete).on(location_id));
    info!(tenant_id = %tenant_id, location_id = %location_id, "Location deleted");

    Ok(StatusCode::NO_CONTENT)
}
