use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::application::dtos::maintenance_dto::CleanupResult;
use crate::application::ports::auth_ports::SessionNotifier;
use crate::common::clock::Clock;
use crate::common::config::SessionConfig;
use crate::common::errors::{DomainError, Result};
use crate::domain::entities::refresh_token::RevocationReason;
use crate::domain::entities::session::Session;
use crate::domain::repositories::session_repository::SessionRepository;
use crate::domain::repositories::token_repository::TokenRepository;

/// Concurrent session cap, sliding expiration and session cleanup
pub struct SessionManagementService {
    session_repository: Arc<dyn SessionRepository>,
    token_repository: Arc<dyn TokenRepository>,
    notifier: Arc<dyn SessionNotifier>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionManagementService {
    pub fn new(
        session_repository: Arc<dyn SessionRepository>,
        token_repository: Arc<dyn TokenRepository>,
        notifier: Arc<dyn SessionNotifier>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session_repository,
            token_repository,
            notifier,
            config,
            clock,
        }
    }

    /// Opens a session, evicting the user's oldest ones when the cap is hit
    #[instrument(skip(self, user_agent))]
    pub async fn create_session(
        &self,
        user_id: &str,
        device_fingerprint: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Session> {
        let now = self.clock.now();
        let session = Session::new(
            user_id.to_string(),
            device_fingerprint.to_string(),
            ip_address,
            user_agent,
            now,
            self.config.session_timeout(),
        );

        let evicted = self
            .session_repository
            .create_session_with_limit(session.clone(), self.config.max_concurrent_sessions, now)
            .await?;

        info!("Session {} created for user {}", session.id, user_id);

        if evicted.is_empty() {
            return Ok(session);
        }

        info!(
            "Evicted {} session(s) of user {} to stay within the limit of {}",
            evicted.len(),
            user_id,
            self.config.max_concurrent_sessions
        );

        for old in &evicted {
            if let Err(e) = self
                .token_repository
                .revoke_session_tokens(&old.id, RevocationReason::SessionEvicted, now)
                .await
            {
                // The session row is gone, so its tokens fail on refresh anyway
                warn!("Could not revoke tokens of evicted session {}: {}", old.id, e);
            }
        }

        if self.config.notify_on_concurrent_session {
            if let Err(e) = self
                .notifier
                .notify_concurrent_session(user_id, &session, &evicted)
                .await
            {
                warn!("Concurrent session notification failed for user {}: {}", user_id, e);
            }
        }

        Ok(session)
    }

    /// True when the session exists and has not expired.
    ///
    /// Any store failure counts as invalid. With sliding expiration the
    /// session's lifetime restarts from now.
    #[instrument(skip(self))]
    pub async fn validate_session(&self, session_id: &str) -> bool {
        let now = self.clock.now();

        let mut session = match self.session_repository.get_session_by_id(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("Session {} not found", session_id);
                return false;
            }
            Err(e) => {
                error!("Session lookup failed for {}: {}", session_id, e);
                return false;
            }
        };

        if session.is_expired_at(now) {
            debug!("Session {} expired at {}", session_id, session.expires_at);
            return false;
        }

        if !self.config.sliding_expiration {
            return true;
        }

        session.touch(now, self.config.session_timeout());
        match self
            .session_repository
            .update_session_activity(session_id, session.last_activity_at, session.expires_at)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                debug!("Session {} disappeared during validation", session_id);
                false
            }
            Err(e) => {
                error!("Could not extend session {}: {}", session_id, e);
                false
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn cleanup_expired_sessions(&self) -> CleanupResult {
        match self.session_repository.delete_expired_sessions(self.clock.now()).await {
            Ok(count) => {
                if count > 0 {
                    info!("Removed {} expired sessions", count);
                }
                CleanupResult::success(count, format!("{} expired sessions removed", count))
            }
            Err(e) => {
                error!("Expired session cleanup failed: {}", e);
                CleanupResult::failure(format!("session cleanup failed: {}", e))
            }
        }
    }

    /// Ends one session and revokes its refresh tokens. Idempotent.
    #[instrument(skip(self))]
    pub async fn end_session(&self, session_id: &str, reason: RevocationReason) -> Result<()> {
        let now = self.clock.now();
        let revoked = self
            .token_repository
            .revoke_session_tokens(session_id, reason, now)
            .await?;
        let deleted = self.session_repository.delete_session(session_id).await?;

        debug!(
            "Ended session {} (existed: {}, tokens revoked: {})",
            session_id, deleted, revoked
        );
        Ok(())
    }

    /// Ends every session of the user; returns how many were removed
    #[instrument(skip(self))]
    pub async fn end_user_sessions(&self, user_id: &str) -> Result<u64> {
        let ended = self.session_repository.delete_user_sessions(user_id).await?;
        info!("Ended {} session(s) of user {}", ended.len(), user_id);
        Ok(ended.len() as u64)
    }

    pub async fn list_active_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let sessions = self
            .session_repository
            .get_active_sessions_by_user(user_id, self.clock.now())
            .await?;
        Ok(sessions)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.session_repository
            .get_session_by_id(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Session", session_id))
    }
}
