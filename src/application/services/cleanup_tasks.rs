use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dtos::maintenance_dto::CleanupResult;
use crate::application::ports::maintenance_ports::CleanupTask;
use crate::application::services::ip_security_service::IpSecurityService;
use crate::application::services::session_management_service::SessionManagementService;
use crate::application::services::token_service::TokenService;
use crate::application::services::two_factor_service::TwoFactorService;

/// Expired sessions, token maintenance and stale 2FA challenges
pub struct SessionMaintenanceTask {
    session_service: Arc<SessionManagementService>,
    token_service: Arc<TokenService>,
    two_factor_service: Arc<TwoFactorService>,
}

impl SessionMaintenanceTask {
    pub fn new(
        session_service: Arc<SessionManagementService>,
        token_service: Arc<TokenService>,
        two_factor_service: Arc<TwoFactorService>,
    ) -> Self {
        Self {
            session_service,
            token_service,
            two_factor_service,
        }
    }
}

#[async_trait]
impl CleanupTask for SessionMaintenanceTask {
    fn name(&self) -> &'static str {
        "session-maintenance"
    }

    async fn run(&self) -> CleanupResult {
        let sessions = self.session_service.cleanup_expired_sessions().await;
        let tokens = self.token_service.perform_maintenance().await;
        let challenges = self.two_factor_service.cleanup_expired_challenges().await;

        CleanupResult::combine(vec![sessions, tokens, challenges])
    }
}

/// Security event retention and lapsed IP blocks
pub struct SecurityEventRetentionTask {
    ip_security_service: Arc<IpSecurityService>,
}

impl SecurityEventRetentionTask {
    pub fn new(ip_security_service: Arc<IpSecurityService>) -> Self {
        Self { ip_security_service }
    }
}

#[async_trait]
impl CleanupTask for SecurityEventRetentionTask {
    fn name(&self) -> &'static str {
        "security-event-retention"
    }

    async fn run(&self) -> CleanupResult {
        let events = self.ip_security_service.cleanup_old_events().await;
        let blocks = self.ip_security_service.purge_expired_blocks().await;

        CleanupResult::combine(vec![events, blocks])
    }
}
