//! JWT token utilities using RS256.
//!
//! Tokens carry the user id, the tenant the user belongs to (absent for
//! platform administrators) and the user's role so that request handlers can
//! scope every query without another database round trip.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Tenant the user belongs to; `None` for platform administrators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    /// Role name in SCREAMING_SNAKE_CASE
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    /// Unique token identifier
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    /// Parses the subject into a user id.
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }

    /// Parses the tenant claim, if any.
    pub fn tenant_id(&self) -> Result<Option<Uuid>, JwtError> {
        self.tid
            .as_deref()
            .map(|t| Uuid::parse_str(t).map_err(|_| JwtError::InvalidToken))
            .transpose()
    }
}

/// Type of JWT token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Identity that a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub role: String,
}

/// A freshly issued token and its identifier.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_in: i64,
}

/// Signing and validation settings.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("algorithm", &self.algorithm)
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .field("refresh_token_expiry_secs", &self.refresh_token_expiry_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

impl JwtConfig {
    /// Creates a config from an RSA key pair in PEM format.
    pub fn new(
        private_key_pem: &str,
        public_key_pem: &str,
        access_token_expiry_secs: i64,
        refresh_token_expiry_secs: i64,
        leeway_secs: u64,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid private key: {}", e)))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm: Algorithm::RS256,
            access_token_expiry_secs,
            refresh_token_expiry_secs,
            leeway_secs,
        })
    }

    /// HS256 config for unit tests. Never use with real users.
    pub fn with_shared_secret(secret: &str, access_token_expiry_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            access_token_expiry_secs,
            refresh_token_expiry_secs: access_token_expiry_secs * 24,
            leeway_secs: 0,
        }
    }

    pub fn generate_access_token(&self, subject: &TokenSubject) -> Result<IssuedToken, JwtError> {
        self.generate_token(subject, TokenType::Access, self.access_token_expiry_secs)
    }

    pub fn generate_refresh_token(&self, subject: &TokenSubject) -> Result<IssuedToken, JwtError> {
        self.generate_token(subject, TokenType::Refresh, self.refresh_token_expiry_secs)
    }

    fn generate_token(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        expiry_secs: i64,
    ) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: subject.user_id.to_string(),
            tid: subject.tenant_id.map(|t| t.to_string()),
            role: subject.role.clone(),
            exp: (now + Duration::seconds(expiry_secs)).timestamp(),
            iat: now.timestamp(),
            jti: jti.clone(),
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_in: expiry_secs,
        })
    }

    /// Validates signature and expiry and returns the claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate_typed(token, TokenType::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate_typed(token, TokenType::Refresh)
    }

    fn validate_typed(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != expected {
            return Err(JwtError::InvalidToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig::with_shared_secret("unit_test_secret_for_clubhouse_tokens", 900)
    }

    fn member_subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            role: "MEMBER".to_string(),
        }
    }

    #[test]
    fn test_access_token_carries_tenant_and_role() {
        let config = config();
        let subject = member_subject();

        let issued = config.generate_access_token(&subject).unwrap();
        let claims = config.validate_access_token(&issued.token).unwrap();

        assert_eq!(claims.user_id().unwrap(), subject.user_id);
        assert_eq!(claims.tenant_id().unwrap(), subject.tenant_id);
        assert_eq!(claims.role, "MEMBER");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(issued.expires_in, 900);
    }

    #[test]
    fn test_platform_admin_token_has_no_tenant() {
        let config = config();
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            tenant_id: None,
            role: "PLATFORM_ADMIN".to_string(),
        };

        let issued = config.generate_access_token(&subject).unwrap();
        let claims = config.validate_access_token(&issued.token).unwrap();

        assert!(claims.tid.is_none());
        assert_eq!(claims.tenant_id().unwrap(), None);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let config = config();
        let subject = member_subject();

        let access = config.generate_access_token(&subject).unwrap();
        let refresh = config.generate_refresh_token(&subject).unwrap();

        assert!(matches!(
            config.validate_refresh_token(&access.token),
            Err(JwtError::InvalidToken)
        ));
        assert!(matches!(
            config.validate_access_token(&refresh.token),
            Err(JwtError::InvalidToken)
        ));
        assert!(config.validate_refresh_token(&refresh.token).is_ok());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = JwtConfig::with_shared_secret("unit_test_secret_for_clubhouse_tokens", -60);
        let issued = config.generate_access_token(&member_subject()).unwrap();

        assert!(matches!(
            config.validate_access_token(&issued.token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issued = config().generate_access_token(&member_subject()).unwrap();
        let other = JwtConfig::with_shared_secret("a_completely_different_secret_value", 900);

        assert!(other.validate_access_token(&issued.token).is_err());
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(config().validate_token("not_a_jwt").is_err());
        assert!(config().validate_token("a.b.c").is_err());
    }

    #[test]
    fn test_invalid_rsa_key_is_reported() {
        let result = JwtConfig::new("not a pem", "not a pem", 900, 3600, 30);
        assert!(matches!(result, Err(JwtError::InvalidKey(_))));
    }

    #[test]
    fn test_malformed_tenant_claim() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            tid: Some("not-a-uuid".to_string()),
            role: "STAFF".to_string(),
            exp: 0,
            iat: 0,
            jti: "x".to_string(),
            token_type: TokenType::Access,
        };
        assert!(claims.tenant_id().is_err());
    }

    #[test]
    fn test_token_type_serialization() {
        assert_eq!(serde_json::to_string(&TokenType::Access).unwrap(), "\"access\"");
        assert_eq!(serde_json::to_string(&TokenType::Refresh).unwrap(), "\"refresh\"");
    }
}
