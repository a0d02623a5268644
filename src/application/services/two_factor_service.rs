use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::application::dtos::maintenance_dto::CleanupResult;
use crate::application::ports::auth_ports::TwoFactorCodeSender;
use crate::common::clock::Clock;
use crate::common::config::TwoFactorConfig;
use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::two_factor_challenge::TwoFactorChallenge;
use crate::domain::entities::user::User;
use crate::domain::repositories::two_factor_repository::TwoFactorRepository;
use crate::domain::repositories::RepositoryError;
use crate::domain::services::secrets::{generate_numeric_code, hash_secret};

#[derive(Debug, thiserror::Error)]
pub enum TwoFactorError {
    #[error("Verification challenge not found")]
    NotFound,

    #[error("Verification code expired")]
    Expired,

    #[error("Verification code already used")]
    AlreadyUsed,

    #[error("Too many failed verification attempts")]
    TooManyAttempts,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Code delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Challenge store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<RepositoryError> for TwoFactorError {
    fn from(err: RepositoryError) -> Self {
        TwoFactorError::StoreUnavailable(err.to_string())
    }
}

impl From<TwoFactorError> for DomainError {
    fn from(err: TwoFactorError) -> Self {
        let kind = match &err {
            TwoFactorError::NotFound | TwoFactorError::InvalidCode | TwoFactorError::AlreadyUsed => {
                ErrorKind::AccessDenied
            }
            TwoFactorError::Expired => ErrorKind::Expired,
            TwoFactorError::TooManyAttempts => ErrorKind::AccessDenied,
            TwoFactorError::DeliveryFailed(_) | TwoFactorError::StoreUnavailable(_) => ErrorKind::Unavailable,
        };
        DomainError::new(kind, "TwoFactorChallenge", err.to_string())
    }
}

pub type TwoFactorResult<T> = Result<T, TwoFactorError>;

/// One-time code challenges for the second login factor
pub struct TwoFactorService {
    repository: Arc<dyn TwoFactorRepository>,
    sender: Arc<dyn TwoFactorCodeSender>,
    config: TwoFactorConfig,
    clock: Arc<dyn Clock>,
}

impl TwoFactorService {
    pub fn new(
        repository: Arc<dyn TwoFactorRepository>,
        sender: Arc<dyn TwoFactorCodeSender>,
        config: TwoFactorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            sender,
            config,
            clock,
        }
    }

    /// Code lifetime in seconds, for clients to show a countdown
    pub fn code_ttl_secs(&self) -> i64 {
        self.config.code_ttl().num_seconds()
    }

    /// Stores a new challenge and sends its code; returns the challenge id
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn start_challenge(&self, user: &User, device_fingerprint: &str) -> TwoFactorResult<String> {
        let code = generate_numeric_code(self.config.code_length);
        let challenge = TwoFactorChallenge::new(
            user.id().to_string(),
            hash_secret(&code),
            device_fingerprint.to_string(),
            self.clock.now(),
            self.config.code_ttl(),
        );

        self.repository.create_challenge(&challenge).await?;

        self.sender
            .send_code(user, &code)
            .await
            .map_err(|e| TwoFactorError::DeliveryFailed(e.to_string()))?;

        info!("Two-factor challenge {} issued", challenge.id);
        Ok(challenge.id)
    }

    /// Checks `code` against the challenge and consumes it on success
    #[instrument(skip(self, code))]
    pub async fn verify_challenge(&self, challenge_id: &str, code: &str) -> TwoFactorResult<TwoFactorChallenge> {
        let now = self.clock.now();

        let mut challenge = self
            .repository
            .get_challenge(challenge_id)
            .await?
            .ok_or(TwoFactorError::NotFound)?;

        if challenge.is_consumed() {
            return Err(TwoFactorError::AlreadyUsed);
        }
        if challenge.is_expired_at(now) {
            return Err(TwoFactorError::Expired);
        }
        if challenge.attempts >= self.config.max_attempts {
            return Err(TwoFactorError::TooManyAttempts);
        }

        if hash_secret(code.trim()) != challenge.code_hash {
            let attempts = self.repository.increment_attempts(challenge_id).await?;
            warn!("Wrong code for challenge {} (attempt {})", challenge_id, attempts);

            if attempts >= self.config.max_attempts {
                return Err(TwoFactorError::TooManyAttempts);
            }
            return Err(TwoFactorError::InvalidCode);
        }

        // Two concurrent correct answers: only one consumes the challenge
        if !self.repository.mark_consumed(challenge_id, now).await? {
            return Err(TwoFactorError::AlreadyUsed);
        }

        challenge.consumed_at = Some(now);
        debug!("Challenge {} verified", challenge_id);
        Ok(challenge)
    }

    #[instrument(skip(self))]
    pub async fn cleanup_expired_challenges(&self) -> CleanupResult {
        match self.repository.delete_expired_challenges(self.clock.now()).await {
            Ok(count) => CleanupResult::success(count, format!("{} expired 2FA challenges removed", count)),
            Err(e) => {
                error!("Two-factor challenge cleanup failed: {}", e);
                CleanupResult::failure(format!("2FA challenge cleanup failed: {}", e))
            }
        }
    }
}
