//! In-memory stores and a fully wired service graph for service tests.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::application::dtos::user_dto::ClientInfo;
use crate::application::ports::auth_ports::{SessionNotifier, TwoFactorCodeSender};
use crate::application::services::auth_application_service::{AuthApplicationService, AuthFlowServices};
use crate::application::services::ip_security_service::IpSecurityService;
use crate::application::services::session_management_service::SessionManagementService;
use crate::application::services::token_service::TokenService;
use crate::application::services::two_factor_service::TwoFactorService;
use crate::common::clock::ManualClock;
use crate::common::config::AppConfig;
use crate::common::errors::DomainError;
use crate::domain::entities::blocked_ip::{BlockedIp, IpWhitelistEntry};
use crate::domain::entities::ip_security_event::{IpSecurityEvent, SecurityOutcome};
use crate::domain::entities::refresh_token::{RefreshToken, RevocationReason};
use crate::domain::entities::session::{sessions_to_evict, Session};
use crate::domain::entities::two_factor_challenge::TwoFactorChallenge;
use crate::domain::entities::user::{User, UserRole};
use crate::domain::repositories::blocked_ip_repository::BlockedIpRepository;
use crate::domain::repositories::ip_security_event_repository::IpSecurityEventRepository;
use crate::domain::repositories::ip_whitelist_repository::IpWhitelistRepository;
use crate::domain::repositories::session_repository::SessionRepository;
use crate::domain::repositories::token_repository::{RotationOutcome, TokenRepository};
use crate::domain::repositories::two_factor_repository::TwoFactorRepository;
use crate::domain::repositories::user_repository::UserRepository;
use crate::domain::repositories::{RepositoryError, RepositoryResult};
use crate::domain::services::auth_service::AuthService;

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hs256";
pub const TEST_PASSWORD: &str = "correct horse battery";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config
}

pub fn client(ip: &str) -> ClientInfo {
    ClientInfo {
        ip: ip.parse().unwrap(),
        user_agent: Some("Mozilla/5.0 (test)".to_string()),
        device_fingerprint: "device-a".to_string(),
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Makes a store answer every call with `Unavailable`
#[derive(Default)]
pub struct Outage(AtomicBool);

impl Outage {
    pub fn set(&self, down: bool) {
        self.0.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.0.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("pool timed out".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    pub sessions: Mutex<HashMap<String, Session>>,
    pub outage: Outage,
}

impl InMemorySessionRepository {
    pub fn insert(&self, session: Session) {
        self.sessions.lock().unwrap().insert(session.id.clone(), session);
    }

    pub fn count_for(&self, user_id: &str) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create_session_with_limit(
        &self,
        session: Session,
        max_concurrent: usize,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Session>> {
        self.outage.check()?;
        // One lock for the whole operation, like the per-user lock in Postgres
        let mut sessions = self.sessions.lock().unwrap();

        let existing: Vec<Session> = sessions
            .values()
            .filter(|s| s.user_id == session.user_id)
            .cloned()
            .collect();
        let evicted: Vec<Session> = sessions_to_evict(&existing, max_concurrent, now)
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect();

        sessions.insert(session.id.clone(), session);
        Ok(evicted)
    }

    async fn get_session_by_id(&self, id: &str) -> RepositoryResult<Option<Session>> {
        self.outage.check()?;
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn get_active_sessions_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Session>> {
        self.outage.check()?;
        let mut active: Vec<Session> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by_key(|s| s.created_at);
        Ok(active)
    }

    async fn update_session_activity(
        &self,
        id: &str,
        last_activity_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        self.outage.check()?;
        match self.sessions.lock().unwrap().get_mut(id) {
            Some(session) => {
                session.last_activity_at = last_activity_at;
                session.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_session(&self, id: &str) -> RepositoryResult<bool> {
        self.outage.check()?;
        Ok(self.sessions.lock().unwrap().remove(id).is_some())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> RepositoryResult<Vec<String>> {
        self.outage.check()?;
        let mut sessions = self.sessions.lock().unwrap();
        let ids: Vec<String> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id.clone())
            .collect();
        for id in &ids {
            sessions.remove(id);
        }
        Ok(ids)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        self.outage.check()?;
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

/// Tokens keyed by hash
#[derive(Default)]
pub struct InMemoryTokenRepository {
    pub tokens: Mutex<HashMap<String, RefreshToken>>,
    pub outage: Outage,
}

impl InMemoryTokenRepository {
    pub fn by_id(&self, id: &str) -> Option<RefreshToken> {
        self.tokens.lock().unwrap().values().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    fn revoke_where<F>(&self, reason: RevocationReason, ip: Option<String>, now: DateTime<Utc>, pred: F) -> u64
    where
        F: Fn(&RefreshToken) -> bool,
    {
        let mut tokens = self.tokens.lock().unwrap();
        let mut count = 0;
        for token in tokens.values_mut() {
            if token.is_active_at(now) && pred(token) {
                token.revoke(now, reason, ip.clone());
                count += 1;
            }
        }
        count
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn create_token(&self, token: &RefreshToken) -> RepositoryResult<()> {
        self.outage.check()?;
        let mut tokens = self.tokens.lock().unwrap();
        if tokens.contains_key(&token.token_hash) {
            return Err(RepositoryError::AlreadyExists(token.id.clone()));
        }
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>> {
        self.outage.check()?;
        Ok(self.tokens.lock().unwrap().get(token_hash).cloned())
    }

    async fn rotate_token(
        &self,
        token_hash: &str,
        successor: RefreshToken,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RotationOutcome> {
        self.outage.check()?;
        let mut tokens = self.tokens.lock().unwrap();

        let previous = match tokens.get_mut(token_hash) {
            None => return Ok(RotationOutcome::NotFound),
            Some(current) if !current.is_active_at(now) => {
                return Ok(RotationOutcome::Rejected(current.clone()));
            }
            Some(current) => {
                current.mark_used(now, &successor.id);
                current.clone()
            }
        };

        tokens.insert(successor.token_hash.clone(), successor.clone());
        Ok(RotationOutcome::Rotated { previous, successor })
    }

    async fn revoke_token(
        &self,
        token_hash: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        self.outage.check()?;
        match self.tokens.lock().unwrap().get_mut(token_hash) {
            Some(token) if !token.is_revoked() => {
                token.revoke(now, reason, revoked_by_ip);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_family(
        &self,
        family_id: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        self.outage.check()?;
        Ok(self.revoke_where(reason, revoked_by_ip, now, |t| t.family_id == family_id))
    }

    async fn revoke_user_tokens(
        &self,
        user_id: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        self.outage.check()?;
        Ok(self.revoke_where(reason, revoked_by_ip, now, |t| t.user_id == user_id))
    }

    async fn revoke_session_tokens(
        &self,
        session_id: &str,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        self.outage.check()?;
        Ok(self.revoke_where(reason, None, now, |t| t.session_id.as_deref() == Some(session_id)))
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        self.outage.check()?;
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at >= cutoff);
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        self.outage.check()?;
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| t.created_at >= cutoff);
        Ok((before - tokens.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryIpSecurityEventRepository {
    pub events: Mutex<Vec<IpSecurityEvent>>,
    pub outage: Outage,
}

impl InMemoryIpSecurityEventRepository {
    pub fn outcomes_for(&self, ip: &str) -> Vec<SecurityOutcome> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.ip_address == ip)
            .map(|e| e.outcome)
            .collect()
    }
}

#[async_trait]
impl IpSecurityEventRepository for InMemoryIpSecurityEventRepository {
    async fn record_event(&self, event: &IpSecurityEvent) -> RepositoryResult<()> {
        self.outage.check()?;
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn count_events_since(
        &self,
        ip_address: &str,
        outcome: SecurityOutcome,
        since: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        self.outage.check()?;
        let count = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.ip_address == ip_address && e.outcome == outcome && e.occurred_at >= since)
            .count();
        Ok(count as i64)
    }

    async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        self.outage.check()?;
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.occurred_at >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryBlockedIpRepository {
    pub blocks: Mutex<HashMap<String, BlockedIp>>,
    pub outage: Outage,
}

#[async_trait]
impl BlockedIpRepository for InMemoryBlockedIpRepository {
    async fn upsert_block(&self, block: &BlockedIp) -> RepositoryResult<()> {
        self.outage.check()?;
        self.blocks.lock().unwrap().insert(block.ip_address.clone(), block.clone());
        Ok(())
    }

    async fn find_active_block(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<BlockedIp>> {
        self.outage.check()?;
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(ip_address)
            .filter(|b| b.is_active_at(now))
            .cloned())
    }

    async fn remove_block(&self, ip_address: &str) -> RepositoryResult<bool> {
        self.outage.check()?;
        Ok(self.blocks.lock().unwrap().remove(ip_address).is_some())
    }

    async fn list_blocks(&self) -> RepositoryResult<Vec<BlockedIp>> {
        self.outage.check()?;
        Ok(self.blocks.lock().unwrap().values().cloned().collect())
    }

    async fn delete_expired_blocks(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        self.outage.check()?;
        let mut blocks = self.blocks.lock().unwrap();
        let before = blocks.len();
        blocks.retain(|_, b| b.expires_at.map_or(true, |until| until > now));
        Ok((before - blocks.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryIpWhitelistRepository {
    pub entries: Mutex<HashMap<String, IpWhitelistEntry>>,
}

#[async_trait]
impl IpWhitelistRepository for InMemoryIpWhitelistRepository {
    async fn upsert_entry(&self, entry: &IpWhitelistEntry) -> RepositoryResult<()> {
        self.entries.lock().unwrap().insert(entry.ip_address.clone(), entry.clone());
        Ok(())
    }

    async fn find_entry(&self, ip_address: &str) -> RepositoryResult<Option<IpWhitelistEntry>> {
        Ok(self.entries.lock().unwrap().get(ip_address).cloned())
    }

    async fn remove_entry(&self, ip_address: &str) -> RepositoryResult<bool> {
        Ok(self.entries.lock().unwrap().remove(ip_address).is_some())
    }

    async fn list_entries(&self) -> RepositoryResult<Vec<IpWhitelistEntry>> {
        Ok(self.entries.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryTwoFactorRepository {
    pub challenges: Mutex<HashMap<String, TwoFactorChallenge>>,
}

#[async_trait]
impl TwoFactorRepository for InMemoryTwoFactorRepository {
    async fn create_challenge(&self, challenge: &TwoFactorChallenge) -> RepositoryResult<()> {
        self.challenges
            .lock()
            .unwrap()
            .insert(challenge.id.clone(), challenge.clone());
        Ok(())
    }

    async fn get_challenge(&self, id: &str) -> RepositoryResult<Option<TwoFactorChallenge>> {
        Ok(self.challenges.lock().unwrap().get(id).cloned())
    }

    async fn increment_attempts(&self, id: &str) -> RepositoryResult<i32> {
        let mut challenges = self.challenges.lock().unwrap();
        let challenge = challenges
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        challenge.attempts += 1;
        Ok(challenge.attempts)
    }

    async fn mark_consumed(&self, id: &str, now: DateTime<Utc>) -> RepositoryResult<bool> {
        match self.challenges.lock().unwrap().get_mut(id) {
            Some(challenge) if challenge.consumed_at.is_none() => {
                challenge.consumed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut challenges = self.challenges.lock().unwrap();
        let before = challenges.len();
        challenges.retain(|_, c| c.expires_at > now);
        Ok((before - challenges.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    pub users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id().to_string(), user);
    }

    pub fn get(&self, id: &str) -> Option<User> {
        self.users.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_user_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.get(id))
    }

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username() == username)
            .cloned())
    }

    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
        if let Some(user) = self.users.lock().unwrap().get_mut(user_id) {
            user.register_login(at);
        }
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get(user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(user_id.to_string()))?;

        let updated = User::from_data(
            user.id().to_string(),
            user.username().to_string(),
            user.email().to_string(),
            password_hash.to_string(),
            user.role(),
            user.two_factor_enabled(),
            user.is_active(),
            user.created_at(),
            at,
            user.last_login_at(),
        );
        users.insert(user_id.to_string(), updated);
        Ok(())
    }
}

/// Remembers every concurrent-session notification
#[derive(Default)]
pub struct RecordingNotifier {
    /// (user id, evicted session ids)
    pub notifications: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl SessionNotifier for RecordingNotifier {
    async fn notify_concurrent_session(
        &self,
        user_id: &str,
        _new_session: &Session,
        evicted: &[Session],
    ) -> Result<(), DomainError> {
        self.notifications.lock().unwrap().push((
            user_id.to_string(),
            evicted.iter().map(|s| s.id.clone()).collect(),
        ));
        Ok(())
    }
}

/// Keeps the last code sent to each user so tests can answer the challenge
#[derive(Default)]
pub struct CapturingCodeSender {
    pub codes: Mutex<HashMap<String, String>>,
}

impl CapturingCodeSender {
    pub fn code_for(&self, user_id: &str) -> Option<String> {
        self.codes.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait]
impl TwoFactorCodeSender for CapturingCodeSender {
    async fn send_code(&self, user: &User, code: &str) -> Result<(), DomainError> {
        self.codes
            .lock()
            .unwrap()
            .insert(user.id().to_string(), code.to_string());
        Ok(())
    }
}

pub fn employee(username: &str, two_factor: bool) -> User {
    User::new(
        username.to_string(),
        format!("{}@example.com", username),
        TEST_PASSWORD,
        UserRole::Employee,
        two_factor,
    )
    .unwrap()
}

/// Every store in memory, every service wired, time under test control
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub users: Arc<InMemoryUserRepository>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub tokens: Arc<InMemoryTokenRepository>,
    pub events: Arc<InMemoryIpSecurityEventRepository>,
    pub blocks: Arc<InMemoryBlockedIpRepository>,
    pub whitelist: Arc<InMemoryIpWhitelistRepository>,
    pub challenges: Arc<InMemoryTwoFactorRepository>,
    pub notifier: Arc<RecordingNotifier>,
    pub code_sender: Arc<CapturingCodeSender>,
    pub auth_service: Arc<AuthService>,
    pub session_service: Arc<SessionManagementService>,
    pub token_service: Arc<TokenService>,
    pub ip_security_service: Arc<IpSecurityService>,
    pub two_factor_service: Arc<TwoFactorService>,
    pub auth_application_service: Arc<AuthApplicationService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let users = Arc::new(InMemoryUserRepository::default());
        let sessions = Arc::new(InMemorySessionRepository::default());
        let tokens = Arc::new(InMemoryTokenRepository::default());
        let events = Arc::new(InMemoryIpSecurityEventRepository::default());
        let blocks = Arc::new(InMemoryBlockedIpRepository::default());
        let whitelist = Arc::new(InMemoryIpWhitelistRepository::default());
        let challenges = Arc::new(InMemoryTwoFactorRepository::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let code_sender = Arc::new(CapturingCodeSender::default());

        let auth_service = Arc::new(AuthService::new(
            config.auth.jwt_secret.clone(),
            config.auth.access_token_expiry_secs,
        ));
        let session_service = Arc::new(SessionManagementService::new(
            sessions.clone(),
            tokens.clone(),
            notifier.clone(),
            config.session.clone(),
            clock.clone(),
        ));
        let token_service = Arc::new(TokenService::new(tokens.clone(), config.auth.clone(), clock.clone()));
        let ip_security_service = Arc::new(IpSecurityService::new(
            events.clone(),
            blocks.clone(),
            whitelist.clone(),
            config.cleanup.security_event_retention(),
            clock.clone(),
        ));
        let two_factor_service = Arc::new(TwoFactorService::new(
            challenges.clone(),
            code_sender.clone(),
            config.two_factor.clone(),
            clock.clone(),
        ));
        let auth_application_service = Arc::new(AuthApplicationService::new(
            users.clone(),
            AuthFlowServices {
                auth_service: auth_service.clone(),
                session_service: session_service.clone(),
                token_service: token_service.clone(),
                ip_security_service: ip_security_service.clone(),
                two_factor_service: two_factor_service.clone(),
            },
            config.login_protection.clone(),
            config.two_factor.enabled,
            clock.clone(),
        ));

        Self {
            clock,
            users,
            sessions,
            tokens,
            events,
            blocks,
            whitelist,
            challenges,
            notifier,
            code_sender,
            auth_service,
            session_service,
            token_service,
            ip_security_service,
            two_factor_service,
            auth_application_service,
        }
    }
}
