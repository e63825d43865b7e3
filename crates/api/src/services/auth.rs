//! Authentication service for login and token refresh.

use std::sync::Arc;

use domain::models::user::{LoginRequest, TokenResponse};
use domain::models::{TenantStatus, User};
use persistence::repositories::{TenantRepository, UserRepository};
use shared::jwt::{JwtConfig, JwtError, TokenSubject};
use shared::password::{verify_password, PasswordError};
use sqlx::PgPool;
use thiserror::Error;

use crate::config::JwtAuthConfig;
use crate::error::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User is disabled")]
    UserDisabled,

    #[error("Club account is suspended")]
    TenantSuspended,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Token error: {0}")]
    TokenError(#[from] JwtError),

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid email or password".into()),
            AuthError::UserDisabled => ApiError::Forbidden("User account is disabled".into()),
            AuthError::TenantSuspended => ApiError::Forbidden("Club account is suspended".into()),
            AuthError::InvalidRefreshToken => ApiError::Unauthorized("Invalid refresh token".into()),
            AuthError::TokenError(e) => e.into(),
            AuthError::PasswordError(e) => e.into(),
            AuthError::DatabaseError(e) => e.into(),
        }
    }
}

/// Builds the RS256 signing config from the configured PEM keys.
pub fn build_jwt_config(config: &JwtAuthConfig) -> Result<JwtConfig, JwtError> {
    JwtConfig::new(
        &normalize_pem_key(&config.private_key),
        &normalize_pem_key(&config.public_key),
        config.access_token_expiry_secs,
        config.refresh_token_expiry_secs,
        config.leeway_secs,
    )
}

/// Keys passed through environment variables often carry literal `\n` sequences
/// and surrounding quotes.
fn normalize_pem_key(key: &str) -> String {
    key.trim_matches('"').trim_matches('\'').replace("\\n", "\n")
}

/// Authentication service.
pub struct AuthService {
    pool: PgPool,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: Arc<JwtConfig>) -> Self {
        Self { pool, jwt }
    }

    /// Login with email and password.
    ///
    /// Club users pass their club's slug; platform admins omit it.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AuthError> {
        let tenant_id = match request.tenant_slug.as_deref() {
            Some(slug) => {
                let tenant = TenantRepository::new(self.pool.clone())
                    .find_by_slug(&slug.to_lowercase())
                    .await?
                    .ok_or(AuthError::InvalidCredentials)?;
                if tenant.status == TenantStatus::Suspended {
                    return Err(AuthError::TenantSuspended);
                }
                Some(tenant.id)
            }
            None => None,
        };

        let user_repo = UserRepository::new(self.pool.clone());
        let credentials = user_repo
            .find_credentials(tenant_id, &request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &credentials.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !credentials.is_active {
            return Err(AuthError::UserDisabled);
        }

        user_repo.record_login(credentials.id).await?;
        let user: User = credentials.into();
        self.issue(user)
    }

    /// Exchanges a refresh token for a new token pair.
    ///
    /// Refresh tokens are stateless: the user and its club are re-checked on every refresh.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|e| match e {
                JwtError::TokenExpired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
                    AuthError::InvalidRefreshToken
                }
                other => AuthError::TokenError(other),
            })?;
        let user_id = claims
            .user_id()
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = UserRepository::new(self.pool.clone())
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if !user.is_active {
            return Err(AuthError::UserDisabled);
        }
        if let Some(tenant_id) = user.tenant_id {
            let status = TenantRepository::new(self.pool.clone())
                .find_status(tenant_id)
                .await?;
            if status != Some(TenantStatus::Active) {
                return Err(AuthError::TenantSuspended);
            }
        }

        self.issue(user)
    }

    fn issue(&self, user: User) -> Result<TokenResponse, AuthError> {
        let subject = TokenSubject {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role.as_str().to_string(),
        };
        let access = self.jwt.generate_access_token(&subject)?;
        let refresh = self.jwt.generate_refresh_token(&subject)?;

        Ok(TokenResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
            expires_in: access.expires_in,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pem_key() {
        let raw = "\"-----BEGIN KEY-----\\nabc\\n-----END KEY-----\"";
        assert_eq!(
            normalize_pem_key(raw),
            "-----BEGIN KEY-----\nabc\n-----END KEY-----"
        );
        assert_eq!(normalize_pem_key("plain"), "plain");
    }

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(
            ApiError::from(AuthError::InvalidCredentials),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::TenantSuspended),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::UserDisabled),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::TokenError(JwtError::TokenExpired)),
            ApiError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_build_jwt_config_rejects_garbage_keys() {
        let config = JwtAuthConfig {
            private_key: "not-a-key".into(),
            public_key: "not-a-key".into(),
            access_token_expiry_secs: 3600,
            refresh_token_expiry_secs: 86400,
            leeway_secs: 30,
        };
        assert!(matches!(
            build_jwt_config(&config),
            Err(JwtError::InvalidKey(_))
        ));
    }
}
