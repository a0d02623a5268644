use std::net::IpAddr;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::application::dtos::user_dto::{
    AuthResponseDto, ChangePasswordDto, ClientInfo, LoginDto, LoginResponseDto, RefreshTokenDto,
    TwoFactorVerifyDto, UserDto,
};
use crate::application::services::ip_security_service::IpSecurityService;
use crate::application::services::session_management_service::SessionManagementService;
use crate::application::services::token_service::{TokenError, TokenService};
use crate::application::services::two_factor_service::{TwoFactorError, TwoFactorService};
use crate::common::clock::Clock;
use crate::common::config::LoginProtectionConfig;
use crate::common::errors::{DomainError, ErrorKind, Result};
use crate::domain::entities::ip_security_event::{SecurityOperation, SecurityOutcome};
use crate::domain::entities::refresh_token::RevocationReason;
use crate::domain::entities::user::{User, UserError};
use crate::domain::repositories::user_repository::UserRepository;
use crate::domain::services::auth_service::AuthService;

fn invalid_credentials() -> DomainError {
    DomainError::access_denied("Auth", "Invalid credentials")
}

fn session_expired() -> DomainError {
    DomainError::access_denied("Session", "Session expired, please sign in")
}

fn address_blocked() -> DomainError {
    DomainError::new(ErrorKind::AccessDenied, "Auth", "Access from this address is blocked")
}

/// Services the login flow is built from
pub struct AuthFlowServices {
    pub auth_service: Arc<AuthService>,
    pub session_service: Arc<SessionManagementService>,
    pub token_service: Arc<TokenService>,
    pub ip_security_service: Arc<IpSecurityService>,
    pub two_factor_service: Arc<TwoFactorService>,
}

/// Login, second factor, refresh, logout and password change
pub struct AuthApplicationService {
    user_repository: Arc<dyn UserRepository>,
    auth_service: Arc<AuthService>,
    session_service: Arc<SessionManagementService>,
    token_service: Arc<TokenService>,
    ip_security_service: Arc<IpSecurityService>,
    two_factor_service: Arc<TwoFactorService>,
    login_protection: LoginProtectionConfig,
    two_factor_enabled: bool,
    clock: Arc<dyn Clock>,
}

impl AuthApplicationService {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        services: AuthFlowServices,
        login_protection: LoginProtectionConfig,
        two_factor_enabled: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            auth_service: services.auth_service,
            session_service: services.session_service,
            token_service: services.token_service,
            ip_security_service: services.ip_security_service,
            two_factor_service: services.two_factor_service,
            login_protection,
            two_factor_enabled,
            clock,
        }
    }

    /// Event logging must never break the flow it observes
    async fn record(
        &self,
        ip: IpAddr,
        operation: SecurityOperation,
        outcome: SecurityOutcome,
        user_id: Option<String>,
        detail: Option<String>,
    ) {
        if let Err(e) = self
            .ip_security_service
            .record_event(ip, operation, outcome, user_id, detail)
            .await
        {
            error!("Could not record {} {} event for {}: {}", operation, outcome, ip, e);
        }
    }

    async fn ensure_not_blocked(&self, ip: IpAddr, operation: SecurityOperation) -> Result<()> {
        if self.ip_security_service.is_blocked(ip).await? {
            warn!("Rejected {} from blocked address {}", operation, ip);
            self.record(ip, operation, SecurityOutcome::Blocked, None, None).await;
            return Err(address_blocked());
        }
        Ok(())
    }

    /// Records a failure and blocks the address once it crosses the threshold
    async fn register_failure(
        &self,
        ip: IpAddr,
        operation: SecurityOperation,
        user_id: Option<String>,
        detail: &str,
    ) {
        self.record(ip, operation, SecurityOutcome::Failure, user_id, Some(detail.to_string()))
            .await;

        let since = self.clock.now() - self.login_protection.failed_attempt_window();
        let failures = match self.ip_security_service.get_failed_attempts_count(ip, since).await {
            Ok(count) => count,
            Err(e) => {
                error!("Could not count failed attempts for {}: {}", ip, e);
                return;
            }
        };

        if failures < self.login_protection.max_failed_attempts {
            return;
        }

        let reason = format!(
            "{} failed attempts within {} minutes",
            failures, self.login_protection.failed_attempt_window_minutes
        );
        if let Err(e) = self
            .ip_security_service
            .block_ip(ip, &reason, Some(self.login_protection.auto_block_duration()), true)
            .await
        {
            error!("Could not block {}: {}", ip, e);
        }
    }

    async fn find_active_user(&self, user_id: &str) -> Result<User> {
        match self.user_repository.get_user_by_id(user_id).await? {
            Some(user) if user.is_active() => Ok(user),
            _ => Err(session_expired()),
        }
    }

    /// Opens the session and issues both tokens
    async fn complete_login(
        &self,
        mut user: User,
        client: &ClientInfo,
        operation: SecurityOperation,
    ) -> Result<AuthResponseDto> {
        let now = self.clock.now();

        let session = self
            .session_service
            .create_session(
                user.id(),
                &client.device_fingerprint,
                Some(client.ip.to_string()),
                client.user_agent.clone(),
            )
            .await?;

        let refresh = self
            .token_service
            .issue_refresh_token(user.id(), Some(session.id.clone()))
            .await?;

        let access_token = self
            .auth_service
            .generate_access_token(&user, &session.id, now)
            .map_err(DomainError::from)?;

        if let Err(e) = self.user_repository.update_last_login(user.id(), now).await {
            warn!("Could not record last login for user {}: {}", user.id(), e);
        }
        user.register_login(now);

        self.record(client.ip, operation, SecurityOutcome::Success, Some(user.id().to_string()), None)
            .await;
        info!("User {} signed in (session {})", user.username(), session.id);

        Ok(AuthResponseDto {
            user: UserDto::from(user),
            session_id: session.id,
            access_token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.auth_service.access_token_expiry_secs(),
        })
    }

    #[instrument(skip(self, dto), fields(username = %dto.username, ip = %client.ip))]
    pub async fn login(&self, dto: LoginDto, client: ClientInfo) -> Result<LoginResponseDto> {
        self.ensure_not_blocked(client.ip, SecurityOperation::Login).await?;

        let user = match self.user_repository.get_user_by_username(&dto.username).await? {
            Some(user) => user,
            None => {
                self.register_failure(client.ip, SecurityOperation::Login, None, "unknown user")
                    .await;
                return Err(invalid_credentials());
            }
        };

        if !user.is_active() {
            self.register_failure(
                client.ip,
                SecurityOperation::Login,
                Some(user.id().to_string()),
                "inactive account",
            )
            .await;
            return Err(invalid_credentials());
        }

        let password_ok = user.verify_password(&dto.password).unwrap_or_else(|e| {
            error!("Password check failed for user {}: {}", user.id(), e);
            false
        });

        if !password_ok {
            self.register_failure(
                client.ip,
                SecurityOperation::Login,
                Some(user.id().to_string()),
                "wrong password",
            )
            .await;
            return Err(invalid_credentials());
        }

        if self.two_factor_enabled && user.two_factor_enabled() {
            let challenge_id = self
                .two_factor_service
                .start_challenge(&user, &client.device_fingerprint)
                .await?;

            return Ok(LoginResponseDto::TwoFactorRequired {
                challenge_id,
                expires_in: self.two_factor_service.code_ttl_secs(),
            });
        }

        let response = self.complete_login(user, &client, SecurityOperation::Login).await?;
        Ok(LoginResponseDto::Authenticated(response))
    }

    #[instrument(skip(self, dto), fields(challenge_id = %dto.challenge_id, ip = %client.ip))]
    pub async fn verify_two_factor(&self, dto: TwoFactorVerifyDto, client: ClientInfo) -> Result<AuthResponseDto> {
        self.ensure_not_blocked(client.ip, SecurityOperation::TwoFactor).await?;

        let challenge = match self
            .two_factor_service
            .verify_challenge(&dto.challenge_id, &dto.code)
            .await
        {
            Ok(challenge) => challenge,
            Err(e) => {
                if matches!(e, TwoFactorError::InvalidCode | TwoFactorError::TooManyAttempts) {
                    self.register_failure(client.ip, SecurityOperation::TwoFactor, None, &e.to_string())
                        .await;
                }
                return Err(e.into());
            }
        };

        if challenge.device_fingerprint != client.device_fingerprint {
            self.register_failure(
                client.ip,
                SecurityOperation::TwoFactor,
                Some(challenge.user_id.clone()),
                "device mismatch",
            )
            .await;
            return Err(DomainError::access_denied(
                "TwoFactorChallenge",
                "Verification must be completed on the device that started the sign-in",
            ));
        }

        let user = match self.user_repository.get_user_by_id(&challenge.user_id).await? {
            Some(user) if user.is_active() => user,
            _ => return Err(invalid_credentials()),
        };

        self.complete_login(user, &client, SecurityOperation::TwoFactor).await
    }

    /// Rotates the refresh token of a session that is still alive
    #[instrument(skip(self, dto), fields(ip = %client.ip))]
    pub async fn refresh(&self, dto: RefreshTokenDto, client: ClientInfo) -> Result<AuthResponseDto> {
        self.ensure_not_blocked(client.ip, SecurityOperation::TokenRefresh).await?;

        // A dead session must not get fresh tokens
        if let Some(current) = self.token_service.find_active_token(&dto.refresh_token).await? {
            let alive = match &current.session_id {
                Some(session_id) => self.session_service.validate_session(session_id).await,
                None => false,
            };
            if !alive {
                self.record(
                    client.ip,
                    SecurityOperation::TokenRefresh,
                    SecurityOutcome::Failure,
                    Some(current.user_id.clone()),
                    Some("session ended".to_string()),
                )
                .await;
                return Err(session_expired());
            }
        }

        let issued = match self
            .token_service
            .rotate_token(&dto.refresh_token, Some(client.ip.to_string()))
            .await
        {
            Ok(issued) => issued,
            Err(TokenError::StoreUnavailable(msg)) => {
                return Err(DomainError::unavailable("RefreshToken", msg));
            }
            Err(e) => {
                self.register_failure(client.ip, SecurityOperation::TokenRefresh, None, &e.to_string())
                    .await;
                return Err(session_expired());
            }
        };

        let session_id = issued.record.session_id.clone().ok_or_else(session_expired)?;
        let user = self.find_active_user(&issued.record.user_id).await?;

        let access_token = self
            .auth_service
            .generate_access_token(&user, &session_id, self.clock.now())
            .map_err(DomainError::from)?;

        self.record(
            client.ip,
            SecurityOperation::TokenRefresh,
            SecurityOutcome::Success,
            Some(user.id().to_string()),
            None,
        )
        .await;

        Ok(AuthResponseDto {
            user: UserDto::from(user),
            session_id,
            access_token,
            refresh_token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: self.auth_service.access_token_expiry_secs(),
        })
    }

    #[instrument(skip(self, refresh_token), fields(ip = %client.ip))]
    pub async fn logout(
        &self,
        user_id: &str,
        session_id: &str,
        refresh_token: Option<String>,
        client: ClientInfo,
    ) -> Result<()> {
        if let Some(token) = refresh_token {
            match self
                .token_service
                .revoke_token(&token, RevocationReason::Logout, Some(client.ip.to_string()))
                .await
            {
                Ok(_) | Err(TokenError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.session_service
            .end_session(session_id, RevocationReason::Logout)
            .await?;

        self.record(
            client.ip,
            SecurityOperation::Logout,
            SecurityOutcome::Success,
            Some(user_id.to_string()),
            None,
        )
        .await;
        info!("User {} signed out of session {}", user_id, session_id);
        Ok(())
    }

    /// Signs the user out everywhere; returns the number of sessions ended
    #[instrument(skip(self), fields(ip = %client.ip))]
    pub async fn logout_all(&self, user_id: &str, client: ClientInfo) -> Result<u64> {
        self.token_service
            .revoke_all_user_tokens(user_id, RevocationReason::LogoutAll, Some(client.ip.to_string()))
            .await?;
        let ended = self.session_service.end_user_sessions(user_id).await?;

        self.record(
            client.ip,
            SecurityOperation::Logout,
            SecurityOutcome::Success,
            Some(user_id.to_string()),
            Some(format!("{} sessions ended", ended)),
        )
        .await;
        Ok(ended)
    }

    /// Changes the password and signs every device out
    #[instrument(skip(self, dto), fields(ip = %client.ip))]
    pub async fn change_password(&self, user_id: &str, dto: ChangePasswordDto, client: ClientInfo) -> Result<()> {
        let mut user = self
            .user_repository
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", user_id))?;

        let current_ok = user.verify_password(&dto.current_password).unwrap_or(false);
        if !current_ok {
            self.register_failure(
                client.ip,
                SecurityOperation::PasswordChange,
                Some(user_id.to_string()),
                "wrong current password",
            )
            .await;
            return Err(DomainError::access_denied("Auth", "Current password is incorrect"));
        }

        let now = self.clock.now();
        user.update_password(&dto.new_password, now).map_err(|e| match e {
            UserError::InvalidPassword(message) => DomainError::validation_error("User", message),
            other => DomainError::internal_error("User", other.to_string()),
        })?;
        self.user_repository
            .update_password_hash(user.id(), user.password_hash(), now)
            .await?;

        self.token_service
            .revoke_all_user_tokens(user_id, RevocationReason::PasswordChanged, Some(client.ip.to_string()))
            .await?;
        self.session_service.end_user_sessions(user_id).await?;

        self.record(
            client.ip,
            SecurityOperation::PasswordChange,
            SecurityOutcome::Success,
            Some(user_id.to_string()),
            None,
        )
        .await;
        info!("Password changed for user {}", user_id);
        Ok(())
    }
}
