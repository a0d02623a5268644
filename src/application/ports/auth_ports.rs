use async_trait::async_trait;

use crate::common::errors::DomainError;
use crate::domain::entities::session::Session;
use crate::domain::entities::user::User;

/// Outbound notification when a login pushes older sessions out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionNotifier: Send + Sync + 'static {
    async fn notify_concurrent_session(
        &self,
        user_id: &str,
        new_session: &Session,
        evicted: &[Session],
    ) -> Result<(), DomainError>;
}

/// Delivers one-time codes to the user (email, SMS...)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TwoFactorCodeSender: Send + Sync + 'static {
    async fn send_code(&self, user: &User, code: &str) -> Result<(), DomainError>;
}
