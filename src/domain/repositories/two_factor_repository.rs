use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::two_factor_challenge::TwoFactorChallenge;
use crate::domain::repositories::RepositoryResult;

#[async_trait]
pub trait TwoFactorRepository: Send + Sync + 'static {
    async fn create_challenge(&self, challenge: &TwoFactorChallenge) -> RepositoryResult<()>;

    async fn get_challenge(&self, id: &str) -> RepositoryResult<Option<TwoFactorChallenge>>;

    /// Returns the attempt count after incrementing
    async fn increment_attempts(&self, id: &str) -> RepositoryResult<i32>;

    /// Marks the challenge consumed; `false` if it already was
    async fn mark_consumed(&self, id: &str, now: DateTime<Utc>) -> RepositoryResult<bool>;

    /// Deletes challenges with `expires_at <= now`
    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}
