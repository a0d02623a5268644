use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::session::Session;
use crate::domain::repositories::RepositoryResult;

#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Inserts `session` after evicting the user's oldest active sessions so
    /// that at most `max_concurrent` remain active.
    ///
    /// Eviction and insert happen atomically and are serialised per user.
    /// Returns the evicted sessions.
    async fn create_session_with_limit(
        &self,
        session: Session,
        max_concurrent: usize,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Session>>;

    async fn get_session_by_id(&self, id: &str) -> RepositoryResult<Option<Session>>;

    /// Sessions not yet expired at `now`, oldest first
    async fn get_active_sessions_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Session>>;

    /// Returns `false` when the session no longer exists
    async fn update_session_activity(
        &self,
        id: &str,
        last_activity_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    async fn delete_session(&self, id: &str) -> RepositoryResult<bool>;

    async fn delete_user_sessions(&self, user_id: &str) -> RepositoryResult<Vec<String>>;

    /// Deletes every session with `expires_at <= now`
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}
