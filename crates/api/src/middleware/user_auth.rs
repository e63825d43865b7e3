//! User JWT authentication middleware.
//!
//! Validates the Bearer access token and stores a [`UserAuth`] in the request
//! extensions. Handlers read it back through the extractor of the same name.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::{AuditAction, Role};
use domain::services::AuditLogBuilder;
use serde_json::json;
use shared::jwt::JwtConfig;
use std::str::FromStr;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated user information extracted from JWT.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// User ID from the JWT subject claim.
    pub user_id: Uuid,
    /// Club the user belongs to; `None` for platform administrators.
    pub tenant_id: Option<Uuid>,
    pub role: Role,
    /// JWT ID (jti) for session tracking.
    pub jti: String,
}

impl UserAuth {
    /// Validates an access token and returns user authentication info.
    pub fn validate(jwt_config: &JwtConfig, token: &str) -> Result<Self, String> {
        let claims = jwt_config
            .validate_access_token(token)
            .map_err(|e| format!("Invalid token: {}", e))?;

        let user_id = claims
            .user_id()
            .map_err(|_| "Invalid user ID in token".to_string())?;
        let tenant_id = claims
            .tenant_id()
            .map_err(|_| "Invalid tenant ID in token".to_string())?;
        let role = Role::from_str(&claims.role)?;

        if role.is_tenant_scoped() && tenant_id.is_none() {
            return Err("Token is missing its tenant".to_string());
        }

        Ok(UserAuth {
            user_id,
            tenant_id,
            role,
            jti: claims.jti,
        })
    }

    /// Tenant scope for club resources.
    ///
    /// Platform administrators carry no tenant and are refused here.
    pub fn tenant(&self) -> Result<Uuid, ApiError> {
        self.tenant_id
            .ok_or_else(|| ApiError::Forbidden("This operation requires a club account".to_string()))
    }

    pub fn has_at_least(&self, role: Role) -> bool {
        self.role.has_at_least(role)
    }

    pub fn is_platform_admin(&self) -> bool {
        self.role == Role::PlatformAdmin
    }

    /// Starts an audit entry attributed to this user.
    pub fn audit(&self, action: AuditAction) -> AuditLogBuilder {
        AuditLogBuilder::user_action(self.tenant_id, self.user_id, action)
    }
}

/// Reads the Bearer token from the Authorization header.
pub fn bearer_token<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware that requires JWT user authentication.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match bearer_token(&req) {
        Some(token) => token.to_string(),
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    match UserAuth::validate(&state.jwt, &token) {
        Ok(auth) => {
            let span = tracing::Span::current();
            span.record("user_id", tracing::field::display(auth.user_id));
            if let Some(tenant_id) = auth.tenant_id {
                span.record("tenant_id", tracing::field::display(tenant_id));
            }
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("JWT validation failed: {}", e);
            unauthorized_response("Invalid or expired token")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::jwt::TokenSubject;

    fn jwt() -> JwtConfig {
        JwtConfig::with_shared_secret("unit-test-secret", 3600)
    }

    #[test]
    fn test_validate_club_token() {
        let tenant_id = Uuid::new_v4();
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            tenant_id: Some(tenant_id),
            role: "STAFF".to_string(),
        };
        let token = jwt().generate_access_token(&subject).unwrap();

        let auth = UserAuth::validate(&jwt(), &token.token).unwrap();
        assert_eq!(auth.user_id, subject.user_id);
        assert_eq!(auth.tenant().unwrap(), tenant_id);
        assert_eq!(auth.role, Role::Staff);
        assert!(auth.has_at_least(Role::Trainer));
        assert!(!auth.has_at_least(Role::ClubAdmin));
    }

    #[test]
    fn test_platform_admin_has_no_tenant() {
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            tenant_id: None,
            role: "PLATFORM_ADMIN".to_string(),
        };
        let token = jwt().generate_access_token(&subject).unwrap();

        let auth = UserAuth::validate(&jwt(), &token.token).unwrap();
        assert!(auth.is_platform_admin());
        assert!(matches!(auth.tenant(), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_club_role_without_tenant_is_rejected() {
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            tenant_id: None,
            role: "MEMBER".to_string(),
        };
        let token = jwt().generate_access_token(&subject).unwrap();
        assert!(UserAuth::validate(&jwt(), &token.token).is_err());
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            role: "MEMBER".to_string(),
        };
        let token = jwt().generate_refresh_token(&subject).unwrap();
        assert!(UserAuth::validate(&jwt(), &token.token).is_err());
    }

    #[test]
    fn test_bearer_token() {
        let req = Request::builder()
            .header("Authorization", "Bearer abc.def")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&req), Some("abc.def"));

        let req = Request::builder()
            .header("Authorization", "Basic xyz")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn test_unauthorized_response() {
        let response = unauthorized_response("Test message");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
