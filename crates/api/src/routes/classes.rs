//! Gym class handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::gym_class::{CreateClassRequest, UpdateClassRequest};
use domain::models::{AuditAction, ClassStatus, GymClass, Role};
use persistence::repositories::{GymClassRepository, LocationRepository, UserRepository};
use serde::Deserialize;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

#[derive(Debug, Deserialize)]
pub struct ListClassesQuery {
    pub status: Option<ClassStatus>,
}

/// Checks that the user exists in the club and may lead classes.
pub(crate) async fn ensure_trainer(
    state: &AppState,
    tenant_id: Uuid,
    trainer_id: Uuid,
) -> Result<(), ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .find_in_tenant(tenant_id, trainer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Trainer not found".to_string()))?;
    if !user.is_active || !user.role.has_at_least(Role::Trainer) {
        return Err(ApiError::Validation(
            "Assigned user is not an active trainer".to_string(),
        ));
    }
    Ok(())
}

pub(crate) async fn ensure_location(
    state: &AppState,
    tenant_id: Uuid,
    location_id: Uuid,
) -> Result<(), ApiError> {
    LocationRepository::new(state.pool.clone())
        .find_by_id(tenant_id, location_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Location not found".to_string()))?;
    Ok(())
}

async fn load(repo: &GymClassRepository, tenant_id: Uuid, id: Uuid) -> Result<GymClass, ApiError> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))
}

/// Create a class.
///
/// POST /api/classes
pub async fn create_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<GymClass>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    if let Some(trainer_id) = request.trainer_id {
        ensure_trainer(&state, tenant_id, trainer_id).await?;
    }
    if let Some(location_id) = request.location_id {
        ensure_location(&state, tenant_id, location_id).await?;
    }

    let class = GymClassRepository::new(state.pool.clone())
        .create(tenant_id, &request)
        .await?;

    state.audit(
        auth.audit(AuditAction::ClassCreate)
            .on(class.id)
            .with_resource_name(class.name.clone()),
    );
    info!(tenant_id = %tenant_id, class_id = %class.id, "Class created");

    Ok((StatusCode::CREATED, Json(class)))
}

/// GET /api/classes?status=&page=&size=
pub async fn list_classes(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListClassesQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<GymClass>>, ApiError> {
    let (classes, total) = GymClassRepository::new(state.pool.clone())
        .list(auth.tenant()?, query.status, &page)
        .await?;
    Ok(Json(Page::new(classes, page, total)))
}

/// GET /api/classes/:class_id
pub async fn get_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(class_id): Path<Uuid>,
) -> Result<Json<GymClass>, ApiError> {
    let repo = GymClassRepository::new(state.pool.clone());
    Ok(Json(load(&repo, auth.tenant()?, class_id).await?))
}

/// Update a class. Sessions already scheduled keep their own capacity.
///
/// PUT /api/classes/:class_id
pub async fn update_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(class_id): Path<Uuid>,
    Json(request): Json<UpdateClassRequest>,
) -> Result<Json<GymClass>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = GymClassRepository::new(state.pool.clone());
    let mut class = load(&repo, tenant_id, class_id).await?;

    if let Some(trainer_id) = request.trainer_id {
        ensure_trainer(&state, tenant_id, trainer_id).await?;
        class.trainer_id = Some(trainer_id);
    }
    if let Some(location_id) = request.location_id {
        ensure_location(&state, tenant_id, location_id).await?;
        class.location_id = Some(location_id);
    }
    if let Some(capacity) = request.max_capacity {
        class.update_capacity(capacity)?;
    }
    if let Some(name) = request.name {
        class.name = name;
    }
    if request.description.is_some() {
        class.description = request.description;
    }
    if let Some(minutes) = request.duration_minutes {
        class.duration_minutes = minutes;
    }
    if let Some(enabled) = request.waitlist_enabled {
        class.waitlist_enabled = enabled;
    }
    if let Some(size) = request.max_waitlist_size {
        class.max_waitlist_size = size;
    }
    if let Some(deducts) = request.deducts_class_from_plan {
        class.deducts_class_from_plan = deducts;
    }

    let class = repo.update(&class).await?;
    state.audit(auth.audit(AuditAction::ClassUpdate).on(class.id));

    Ok(Json(class))
}

async fn change_status(
    state: &AppState,
    auth: &UserAuth,
    class_id: Uuid,
    change: fn(&mut GymClass) -> Result<(), domain::DomainError>,
) -> Result<GymClass, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = GymClassRepository::new(state.pool.clone());
    let mut class = load(&repo, tenant_id, class_id).await?;
    let from = class.status;
    change(&mut class)?;
    let class = repo.update(&class).await?;

    state.audit(
        auth.audit(AuditAction::ClassUpdate)
            .on(class.id)
            .with_status_change(from, class.status),
    );
    info!(tenant_id = %tenant_id, class_id = %class.id, status = %class.status, "Class status changed");
    Ok(class)
}

/// POST /api/classes/:class_id/activate
pub async fn activate_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(class_id): Path<Uuid>,
) -> Result<Json<GymClass>, ApiError> {
    Ok(Json(change_status(&state, &auth, class_id, GymClass::activate).await?))
}

/// POST /api/classes/:class_id/deactivate
pub async fn deactivate_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(class_id): Path<Uuid>,
) -> Result<Json<GymClass>, ApiError> {
    Ok(Json(change_status(&state, &auth, class_id, GymClass::deactivate).await?))
}

/// POST /api/classes/:class_id/archive
pub async fn archive_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(class_id): Path<Uuid>,
) -> Result<Json<GymClass>, ApiError> {
    Ok(Json(change_status(&state, &auth, class_id, GymClass::archive).await?))
}

/// Delete a class together with its sessions.
///
/// DELETE /api/classes/:class_id
pub async fn delete_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(class_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let deleted = GymClassRepository::new(state.pool.clone())
        .delete(tenant_id, class_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Class not found".to_string()));
    }

    state.audit(auth.audit(AuditAction::ClassDelete).on(class_id));
    info!(tenant_id = %tenant_id, class_id = %class_id, "Class deleted");

    Ok(StatusCode::NO_CONTENT)
}
