use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::user::User;

/**
 * JWT claims for access tokens.
 *
 * Access tokens are short-lived and bound to a session through `sid`, so
 * ending the session invalidates them before `exp`.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id
    pub sub: String,

    /// Session id the token was issued for
    pub sid: String,

    /// Expiration (seconds since Unix epoch)
    pub exp: i64,

    /// Issued at (seconds since Unix epoch)
    pub iat: i64,

    /// Unique token id
    pub jti: String,

    pub username: String,

    pub role: String,
}

/**
 * Access token errors.
 */
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for DomainError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                DomainError::new(ErrorKind::AccessDenied, "Auth", "Invalid credentials")
            }
            AuthError::TokenExpired => DomainError::new(ErrorKind::Expired, "Auth", "Token expired"),
            AuthError::InvalidToken(msg) => {
                DomainError::new(ErrorKind::AccessDenied, "Auth", format!("Invalid token: {}", msg))
            }
            AuthError::AccessDenied(msg) => DomainError::new(ErrorKind::AccessDenied, "Auth", msg),
            AuthError::InternalError(msg) => DomainError::new(ErrorKind::InternalError, "Auth", msg),
        }
    }
}

/**
 * Issues and validates signed access tokens.
 */
pub struct AuthService {
    jwt_secret: String,
    access_token_expiry: i64,
}

impl AuthService {
    pub fn new(jwt_secret: String, access_token_expiry_secs: i64) -> Self {
        Self {
            jwt_secret,
            access_token_expiry: access_token_expiry_secs,
        }
    }

    pub fn generate_access_token(
        &self,
        user: &User,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = TokenClaims {
            sub: user.id().to_string(),
            sid: session_id.to_string(),
            exp: iat + self.access_token_expiry,
            iat,
            jti: Uuid::new_v4().to_string(),
            username: user.username().to_string(),
            role: user.role().to_string(),
        };

        tracing::debug!("Issuing access token: sub={}, sid={}, exp={}", claims.sub, claims.sid, claims.exp);

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!("Error generating token: {}", e);
            AuthError::InternalError(format!("Could not sign token: {}", e))
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(token_data.claims)
    }

    pub fn access_token_expiry_secs(&self) -> i64 {
        self.access_token_expiry
    }
}
