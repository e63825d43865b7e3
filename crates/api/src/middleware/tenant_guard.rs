//! Tenant access guard.
//!
//! Runs after authentication on club routes. Users of a suspended club get 403;
//! while a maintenance window covering the club is active every request gets
//! 503 with the window's message. Platform administrators are not scoped to a
//! club and pass through.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use domain::models::TenantStatus;
use persistence::repositories::{PlatformRepository, TenantRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;

pub async fn tenant_guard(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(tenant_id) = req.extensions().get::<UserAuth>().and_then(|a| a.tenant_id) else {
        return Ok(next.run(req).await);
    };

    let status = TenantRepository::new(state.pool.clone())
        .find_status(tenant_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Club not found".to_string()))?;
    if status == TenantStatus::Suspended {
        return Err(ApiError::Forbidden("Club account is suspended".to_string()));
    }

    let window = PlatformRepository::new(state.pool.clone())
        .active_window(Some(tenant_id), Utc::now())
        .await?;
    if let Some(window) = window {
        tracing::debug!(tenant_id = %tenant_id, window_id = %window.id, "Request blocked by maintenance");
        let retry_after = (window.ends_at - Utc::now()).num_seconds().max(1);
        let mut response = ApiError::ServiceUnavailable(window.message).into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return Ok(response);
    }

    Ok(next.run(req).await)
}
