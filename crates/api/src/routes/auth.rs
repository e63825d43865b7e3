//! Authentication routes for login and token refresh.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Extension, Json,
};
use domain::models::user::{LoginRequest, RefreshRequest, TokenResponse};
use domain::models::{AuditAction, User};
use domain::services::AuditLogBuilder;
use persistence::repositories::UserRepository;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::{record_business_event, RequestId};
use crate::services::AuthService;

/// Login with email and password.
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    request.validate()?;

    let service = AuthService::new(state.pool.clone(), state.jwt.clone());
    let response = service.login(&request).await.map_err(|e| {
        record_business_event("login_failed");
        e
    })?;

    record_business_event("login");
    let mut entry = AuditLogBuilder::user_action(
        response.user.tenant_id,
        response.user.id,
        AuditAction::UserLogin,
    )
    .on(response.user.id)
    .with_actor_email(response.user.email.clone());
    if let Some(agent) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        entry = entry.with_user_agent(agent);
    }
    if let Some(Extension(RequestId(id))) = request_id {
        entry = entry.with_request_id(id);
    }
    state.audit(entry);
    info!(
        user_id = %response.user.id,
        role = %response.user.role,
        "User logged in"
    );

    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair.
///
/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    request.validate()?;

    let service = AuthService::new(state.pool.clone(), state.jwt.clone());
    Ok(Json(service.refresh(&request.refresh_token).await?))
}

/// The signed-in user.
///
/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, auth: UserAuth) -> Result<Json<User>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}
