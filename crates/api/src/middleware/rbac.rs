//! Role gates.
//!
//! Each gate runs after [`require_user_auth`](super::user_auth::require_user_auth)
//! and rejects users below the required role with 403.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use domain::models::Role;

use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;

fn check_role(req: &Request<Body>, required: Role) -> Result<(), ApiError> {
    let auth = req
        .extensions()
        .get::<UserAuth>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if auth.has_at_least(required) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Requires role {} or higher", required)))
    }
}

async fn gate(required: Role, req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    check_role(&req, required)?;
    Ok(next.run(req).await)
}

pub async fn require_platform_admin(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    gate(Role::PlatformAdmin, req, next).await
}

pub async fn require_club_admin(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    gate(Role::ClubAdmin, req, next).await
}

pub async fn require_staff(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    gate(Role::Staff, req, next).await
}

pub async fn require_trainer(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    gate(Role::Trainer, req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request_as(role: Role) -> Request<Body> {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut().insert(UserAuth {
            user_id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            role,
            jti: "jti".to_string(),
        });
        req
    }

    #[test]
    fn test_check_role_hierarchy() {
        assert!(check_role(&request_as(Role::ClubAdmin), Role::Staff).is_ok());
        assert!(check_role(&request_as(Role::Staff), Role::Staff).is_ok());
        assert!(matches!(
            check_role(&request_as(Role::Trainer), Role::Staff),
            Err(ApiError::Forbidden(_))
        ));
        assert!(check_role(&request_as(Role::PlatformAdmin), Role::ClubAdmin).is_ok());
    }

    #[test]
    fn test_check_role_without_auth() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert!(matches!(
            check_role(&req, Role::Member),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
