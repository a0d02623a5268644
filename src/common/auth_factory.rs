use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use crate::application::ports::auth_ports::{SessionNotifier, TwoFactorCodeSender};
use crate::application::services::auth_application_service::{AuthApplicationService, AuthFlowServices};
use crate::application::services::cleanup_tasks::{SecurityEventRetentionTask, SessionMaintenanceTask};
use crate::application::services::ip_security_service::IpSecurityService;
use crate::application::services::session_management_service::SessionManagementService;
use crate::application::services::token_service::TokenService;
use crate::application::services::two_factor_service::TwoFactorService;
use crate::common::clock::Clock;
use crate::common::config::AppConfig;
use crate::common::di::AuthServices;
use crate::domain::services::auth_service::AuthService;
use crate::infrastructure::repositories::{
    BlockedIpPgRepository, IpSecurityEventPgRepository, IpWhitelistPgRepository, SessionPgRepository,
    TokenPgRepository, TwoFactorPgRepository, UserPgRepository,
};
use crate::infrastructure::services::logging_notifier::{LoggingCodeSender, LoggingSessionNotifier};

/// Wires the PostgreSQL-backed auth stack
pub async fn create_auth_services(
    config: &AppConfig,
    pool: Arc<PgPool>,
    clock: Arc<dyn Clock>,
) -> Result<AuthServices> {
    let notifier: Arc<dyn SessionNotifier> = Arc::new(LoggingSessionNotifier);
    let code_sender: Arc<dyn TwoFactorCodeSender> = Arc::new(LoggingCodeSender);

    let auth_service = Arc::new(AuthService::new(
        config.auth.jwt_secret.clone(),
        config.auth.access_token_expiry_secs,
    ));

    let user_repository = Arc::new(UserPgRepository::new(pool.clone()));
    let session_repository = Arc::new(SessionPgRepository::new(pool.clone()));
    let token_repository = Arc::new(TokenPgRepository::new(pool.clone()));

    let session_service = Arc::new(SessionManagementService::new(
        session_repository,
        token_repository.clone(),
        notifier,
        config.session.clone(),
        clock.clone(),
    ));

    let token_service = Arc::new(TokenService::new(token_repository, config.auth.clone(), clock.clone()));

    let ip_security_service = Arc::new(IpSecurityService::new(
        Arc::new(IpSecurityEventPgRepository::new(pool.clone())),
        Arc::new(BlockedIpPgRepository::new(pool.clone())),
        Arc::new(IpWhitelistPgRepository::new(pool.clone())),
        config.cleanup.security_event_retention(),
        clock.clone(),
    ));

    let two_factor_service = Arc::new(TwoFactorService::new(
        Arc::new(TwoFactorPgRepository::new(pool)),
        code_sender,
        config.two_factor.clone(),
        clock.clone(),
    ));

    let auth_application_service = Arc::new(AuthApplicationService::new(
        user_repository,
        AuthFlowServices {
            auth_service: auth_service.clone(),
            session_service: session_service.clone(),
            token_service: token_service.clone(),
            ip_security_service: ip_security_service.clone(),
            two_factor_service: two_factor_service.clone(),
        },
        config.login_protection.clone(),
        config.two_factor.enabled,
        clock,
    ));

    let session_maintenance = Arc::new(SessionMaintenanceTask::new(
        session_service.clone(),
        token_service.clone(),
        two_factor_service.clone(),
    ));
    let security_event_retention = Arc::new(SecurityEventRetentionTask::new(ip_security_service.clone()));

    tracing::info!(
        "Auth services ready (max {} sessions per user, {} min timeout)",
        config.session.max_concurrent_sessions,
        config.session.session_timeout_minutes
    );

    Ok(AuthServices {
        auth_service,
        auth_application_service,
        session_service,
        token_service,
        ip_security_service,
        two_factor_service,
        session_maintenance,
        security_event_retention,
    })
}
