use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::refresh_token::{RefreshToken, RevocationReason};
use crate::domain::repositories::RepositoryResult;

/// Result of an atomic rotation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RotationOutcome {
    /// Old token marked used; successor stored
    Rotated { previous: RefreshToken, successor: RefreshToken },
    /// Old token was no longer active when locked; nothing changed
    Rejected(RefreshToken),
    NotFound,
}

#[async_trait]
pub trait TokenRepository: Send + Sync + 'static {
    async fn create_token(&self, token: &RefreshToken) -> RepositoryResult<()>;

    async fn find_by_hash(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>>;

    /// Locks the token identified by `token_hash`, and if it is still active
    /// at `now` marks it used (pointing at `successor`) and inserts
    /// `successor`, all in one transaction.
    async fn rotate_token(
        &self,
        token_hash: &str,
        successor: RefreshToken,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RotationOutcome>;

    /// Returns `false` when the token was already revoked
    async fn revoke_token(
        &self,
        token_hash: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    async fn revoke_family(
        &self,
        family_id: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64>;

    async fn revoke_user_tokens(
        &self,
        user_id: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64>;

    async fn revoke_session_tokens(
        &self,
        session_id: &str,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64>;

    /// Deletes tokens whose `expires_at` is before `cutoff`
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;

    /// Deletes tokens created before `cutoff`, whatever their state
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;
}
