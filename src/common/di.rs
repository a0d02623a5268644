use std::sync::Arc;

use crate::application::services::auth_application_service::AuthApplicationService;
use crate::application::services::cleanup_tasks::{SecurityEventRetentionTask, SessionMaintenanceTask};
use crate::application::services::ip_security_service::IpSecurityService;
use crate::application::services::session_management_service::SessionManagementService;
use crate::application::services::token_service::TokenService;
use crate::application::services::two_factor_service::TwoFactorService;
use crate::common::config::AppConfig;
use crate::domain::services::auth_service::AuthService;

/// Everything the auth subsystem exposes once wired
pub struct AuthServices {
    pub auth_service: Arc<AuthService>,
    pub auth_application_service: Arc<AuthApplicationService>,
    pub session_service: Arc<SessionManagementService>,
    pub token_service: Arc<TokenService>,
    pub ip_security_service: Arc<IpSecurityService>,
    pub two_factor_service: Arc<TwoFactorService>,
    pub session_maintenance: Arc<SessionMaintenanceTask>,
    pub security_event_retention: Arc<SecurityEventRetentionTask>,
}

/// Shared state handed to every axum handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_service: Arc<AuthService>,
    pub auth_application_service: Arc<AuthApplicationService>,
    pub session_service: Arc<SessionManagementService>,
    pub token_service: Arc<TokenService>,
    pub ip_security_service: Arc<IpSecurityService>,
}

impl AppState {
    pub fn new(config: AppConfig, services: &AuthServices) -> Self {
        Self {
            config: Arc::new(config),
            auth_service: services.auth_service.clone(),
            auth_application_service: services.auth_application_service.clone(),
            session_service: services.session_service.clone(),
            token_service: services.token_service.clone(),
            ip_security_service: services.ip_security_service.clone(),
        }
    }
}
