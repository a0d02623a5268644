use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::ports::auth_ports::{SessionNotifier, TwoFactorCodeSender};
use crate::common::errors::DomainError;
use crate::domain::entities::session::Session;
use crate::domain::entities::user::User;

/// Writes concurrent-login notices to the log; stands in until the HR mailer is wired up
pub struct LoggingSessionNotifier;

#[async_trait]
impl SessionNotifier for LoggingSessionNotifier {
    async fn notify_concurrent_session(
        &self,
        user_id: &str,
        new_session: &Session,
        evicted: &[Session],
    ) -> Result<(), DomainError> {
        for old in evicted {
            warn!(
                user_id,
                new_session_id = %new_session.id,
                new_ip = new_session.ip_address.as_deref().unwrap_or("unknown"),
                evicted_session_id = %old.id,
                evicted_ip = old.ip_address.as_deref().unwrap_or("unknown"),
                "Sign-in from a new device ended an existing session"
            );
        }
        Ok(())
    }
}

/// Logs that a code was issued. The code itself is never written out.
pub struct LoggingCodeSender;

#[async_trait]
impl TwoFactorCodeSender for LoggingCodeSender {
    async fn send_code(&self, user: &User, code: &str) -> Result<(), DomainError> {
        info!(
            user_id = user.id(),
            email = user.email(),
            digits = code.len(),
            "Verification code issued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::user::UserRole;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_logging_adapters_never_fail() {
        let now = Utc::now();
        let user = User::new(
            "maria".to_string(),
            "maria@example.com".to_string(),
            "correct horse battery",
            UserRole::Employee,
            true,
        )
        .unwrap();
        let old = Session::new(user.id().to_string(), "a".into(), None, None, now, Duration::minutes(30));
        let new = Session::new(user.id().to_string(), "b".into(), None, None, now, Duration::minutes(30));

        assert!(LoggingSessionNotifier
            .notify_concurrent_session(user.id(), &new, &[old])
            .await
            .is_ok());
        assert!(LoggingCodeSender.send_code(&user, "123456").await.is_ok());
    }
}
