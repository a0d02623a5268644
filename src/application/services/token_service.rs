//! Refresh token issuance, rotation and revocation.
//!
//! Clients hold an opaque secret; the store only ever sees its SHA-256
//! digest. Rotation is single-use: presenting a token that was already used
//! or revoked is treated as theft and burns the token's whole family.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::application::dtos::maintenance_dto::CleanupResult;
use crate::common::clock::Clock;
use crate::common::config::AuthConfig;
use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::refresh_token::{RefreshToken, RevocationReason};
use crate::domain::repositories::token_repository::{RotationOutcome, TokenRepository};
use crate::domain::repositories::RepositoryError;
use crate::domain::services::secrets::{generate_opaque_token, hash_secret};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token already used or revoked")]
    AlreadyUsedOrRevoked,

    #[error("Refresh token expired")]
    Expired,

    #[error("Token store unavailable: {0}")]
    StoreUnavailable(String),
}

impl TokenError {
    /// Unknown, used and revoked tokens are all just "invalid" to a client
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, TokenError::NotFound | TokenError::AlreadyUsedOrRevoked)
    }
}

impl From<RepositoryError> for TokenError {
    fn from(err: RepositoryError) -> Self {
        TokenError::StoreUnavailable(err.to_string())
    }
}

impl From<TokenError> for DomainError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotFound | TokenError::AlreadyUsedOrRevoked => {
                DomainError::new(ErrorKind::AccessDenied, "RefreshToken", err.to_string())
            }
            TokenError::Expired => DomainError::expired("RefreshToken", err.to_string()),
            TokenError::StoreUnavailable(msg) => DomainError::unavailable("RefreshToken", msg),
        }
    }
}

pub type TokenResult<T> = Result<T, TokenError>;

/// A freshly minted token: the secret for the client plus the stored record
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub record: RefreshToken,
}

pub struct TokenService {
    token_repository: Arc<dyn TokenRepository>,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(token_repository: Arc<dyn TokenRepository>, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            token_repository,
            config,
            clock,
        }
    }

    fn mint(&self, user_id: &str, family_id: Option<String>, session_id: Option<String>) -> IssuedToken {
        let token = generate_opaque_token();
        let record = RefreshToken::new(
            hash_secret(&token),
            user_id.to_string(),
            family_id,
            session_id,
            self.clock.now(),
            self.config.refresh_token_ttl(),
        );
        IssuedToken { token, record }
    }

    /// Starts a new token family for a fresh login
    #[instrument(skip(self))]
    pub async fn issue_refresh_token(&self, user_id: &str, session_id: Option<String>) -> TokenResult<IssuedToken> {
        let issued = self.mint(user_id, None, session_id);
        self.token_repository.create_token(&issued.record).await?;

        debug!(
            "Issued refresh token {} (family {}) for user {}",
            issued.record.id, issued.record.family_id, user_id
        );
        Ok(issued)
    }

    /// Exchanges `old_token` for a successor in the same family
    #[instrument(skip(self, old_token))]
    pub async fn rotate_token(&self, old_token: &str, ip_address: Option<String>) -> TokenResult<IssuedToken> {
        let now = self.clock.now();
        let token_hash = hash_secret(old_token);

        let current = self
            .token_repository
            .find_by_hash(&token_hash)
            .await?
            .ok_or(TokenError::NotFound)?;

        if current.is_used() || current.is_revoked() {
            return Err(self.handle_reuse(&current, ip_address).await);
        }

        if current.is_expired_at(now) {
            debug!("Refresh token {} expired at {}", current.id, current.expires_at);
            return Err(TokenError::Expired);
        }

        let successor = self.mint(
            &current.user_id,
            Some(current.family_id.clone()),
            current.session_id.clone(),
        );

        match self
            .token_repository
            .rotate_token(&token_hash, successor.record.clone(), now)
            .await?
        {
            RotationOutcome::Rotated { previous, successor: stored } => {
                debug!("Rotated refresh token {} -> {}", previous.id, stored.id);
                Ok(IssuedToken {
                    token: successor.token,
                    record: stored,
                })
            }
            // Lost a race with a concurrent rotation of the same token
            RotationOutcome::Rejected(latest) => {
                if latest.is_used() || latest.is_revoked() {
                    Err(self.handle_reuse(&latest, ip_address).await)
                } else {
                    Err(TokenError::Expired)
                }
            }
            RotationOutcome::NotFound => Err(TokenError::NotFound),
        }
    }

    async fn handle_reuse(&self, token: &RefreshToken, ip_address: Option<String>) -> TokenError {
        warn!(
            "Reuse of refresh token {} for user {} detected, revoking family {}",
            token.id, token.user_id, token.family_id
        );

        match self
            .token_repository
            .revoke_family(&token.family_id, RevocationReason::ReuseDetected, ip_address, self.clock.now())
            .await
        {
            Ok(count) => info!("Revoked {} token(s) of family {}", count, token.family_id),
            Err(e) => error!("Could not revoke token family {}: {}", token.family_id, e),
        }

        TokenError::AlreadyUsedOrRevoked
    }

    /// Returns `false` if the token was already revoked
    #[instrument(skip(self, token))]
    pub async fn revoke_token(
        &self,
        token: &str,
        reason: RevocationReason,
        ip_address: Option<String>,
    ) -> TokenResult<bool> {
        let token_hash = hash_secret(token);
        let now = self.clock.now();

        if self.token_repository.find_by_hash(&token_hash).await?.is_none() {
            return Err(TokenError::NotFound);
        }

        let revoked = self
            .token_repository
            .revoke_token(&token_hash, reason, ip_address, now)
            .await?;
        Ok(revoked)
    }

    #[instrument(skip(self))]
    pub async fn revoke_all_user_tokens(
        &self,
        user_id: &str,
        reason: RevocationReason,
        ip_address: Option<String>,
    ) -> TokenResult<u64> {
        let count = self
            .token_repository
            .revoke_user_tokens(user_id, reason, ip_address, self.clock.now())
            .await?;

        info!("Revoked {} refresh token(s) of user {} ({})", count, user_id, reason);
        Ok(count)
    }

    /// The active record behind `token`, if any
    pub async fn find_active_token(&self, token: &str) -> TokenResult<Option<RefreshToken>> {
        let now = self.clock.now();
        let found = self.token_repository.find_by_hash(&hash_secret(token)).await?;
        Ok(found.filter(|t| t.is_active_at(now)))
    }

    /// Deletes tokens that expired longer ago than the grace period
    #[instrument(skip(self))]
    pub async fn cleanup_expired_tokens(&self) -> CleanupResult {
        let cutoff = self.clock.now() - self.config.expired_token_grace();

        match self.token_repository.delete_expired_before(cutoff).await {
            Ok(count) => CleanupResult::success(count, format!("{} expired refresh tokens removed", count)),
            Err(e) => {
                error!("Expired token cleanup failed: {}", e);
                CleanupResult::failure(format!("token cleanup failed: {}", e))
            }
        }
    }

    /// Expired-token cleanup plus removal of anything past the retention window
    #[instrument(skip(self))]
    pub async fn perform_maintenance(&self) -> CleanupResult {
        let expired = self.cleanup_expired_tokens().await;

        let cutoff = self.clock.now() - self.config.token_retention();
        let retained = match self.token_repository.delete_created_before(cutoff).await {
            Ok(count) => CleanupResult::success(count, format!("{} refresh tokens past retention removed", count)),
            Err(e) => {
                error!("Token retention cleanup failed: {}", e);
                CleanupResult::failure(format!("token retention cleanup failed: {}", e))
            }
        };

        CleanupResult::combine(vec![expired, retained])
    }
}
