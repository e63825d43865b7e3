//! Club user management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::user::{CreateUserRequest, UpdateUserRequest};
use domain::models::{AuditAction, Role, User};
use persistence::repositories::UserRepository;
use serde::Deserialize;
use shared::pagination::Page;
use shared::password::{hash_password, is_strong_enough};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
}

/// Create a staff, trainer or member login in the admin's club.
///
/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;

    if !request.role.is_tenant_scoped() {
        return Err(ApiError::Validation(
            "Club users cannot be platform administrators".to_string(),
        ));
    }
    if !is_strong_enough(&request.password) {
        return Err(ApiError::Validation(
            "Password must contain upper and lower case letters and a digit".to_string(),
        ));
    }

    let repo = UserRepository::new(state.pool.clone());
    if repo
        .find_credentials(Some(tenant_id), &request.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "A user with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&request.password)?;
    let user = repo
        .create(
            Some(tenant_id),
            &request.email,
            &password_hash,
            &request.display_name,
            request.role,
        )
        .await?;

    state.audit(
        auth.audit(AuditAction::UserCreate)
            .on(user.id)
            .with_resource_name(user.email.clone()),
    );
    info!(tenant_id = %tenant_id, user_id = %user.id, role = %user.role, "User created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// List the club's users.
///
/// GET /api/users?role=&page=&size=
pub async fn list_users(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListUsersQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<User>>, ApiError> {
    let (users, total) = UserRepository::new(state.pool.clone())
        .list_by_tenant(auth.tenant()?, query.role, &page)
        .await?;
    Ok(Json(Page::new(users, page, total)))
}

/// Get a club user.
///
/// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .find_in_tenant(auth.tenant()?, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// Update a club user's name, role or active flag.
///
/// PUT /api/users/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = UserRepository::new(state.pool.clone());
    let mut user = repo
        .find_in_tenant(tenant_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.id == auth.user_id && (request.role.is_some() || request.is_active == Some(false)) {
        return Err(ApiError::Conflict(
            "You cannot change your own role or deactivate yourself".to_string(),
        ));
    }
    if let Some(role) = request.role {
        if !role.is_tenant_scoped() {
            return Err(ApiError::Validation(
                "Club users cannot be platform administrators".to_string(),
            ));
        }
        user.role = role;
    }
    if let Some(display_name) = request.display_name {
        user.display_name = display_name;
    }
    if let Some(is_active) = request.is_active {
        user.is_active = is_active;
    }

    let user = repo.update(&user).await?;
    info!(tenant_id = %tenant_id, user_id = %user.id, "User updated");

    Ok(Json(user))
}
