//! Extractor for the authenticated user.
//!
//! Reads the [`UserAuth`] inserted by `require_user_auth`; when a route is not
//! behind that middleware the Bearer token is validated here instead.

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
pub use crate::middleware::user_auth::UserAuth;

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing or invalid Authorization header".to_string()))?;

        UserAuth::validate(&state.jwt, token).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })
    }
}
