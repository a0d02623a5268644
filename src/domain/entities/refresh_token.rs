//! Refresh token records.
//!
//! The opaque secret handed to the client is never stored; only its SHA-256
//! digest is persisted. Every token produced by rotation from one login shares
//! a `family_id`, so reuse of a rotated token can revoke the whole lineage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a token was revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    Logout,
    LogoutAll,
    PasswordChanged,
    ReuseDetected,
    SuspiciousActivity,
    SessionEvicted,
    Admin,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Logout => "logout",
            RevocationReason::LogoutAll => "logout_all",
            RevocationReason::PasswordChanged => "password_changed",
            RevocationReason::ReuseDetected => "reuse_detected",
            RevocationReason::SuspiciousActivity => "suspicious_activity",
            RevocationReason::SessionEvicted => "session_evicted",
            RevocationReason::Admin => "admin",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevocationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logout" => Ok(RevocationReason::Logout),
            "logout_all" => Ok(RevocationReason::LogoutAll),
            "password_changed" => Ok(RevocationReason::PasswordChanged),
            "reuse_detected" => Ok(RevocationReason::ReuseDetected),
            "suspicious_activity" => Ok(RevocationReason::SuspiciousActivity),
            "session_evicted" => Ok(RevocationReason::SessionEvicted),
            "admin" => Ok(RevocationReason::Admin),
            other => Err(format!("unknown revocation reason: {}", other)),
        }
    }
}

/// State of a token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Active,
    Used,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    /// SHA-256 hex digest of the secret
    pub token_hash: String,
    pub user_id: String,
    pub family_id: String,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    /// Id of the token issued when this one was rotated
    pub replaced_by: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub revoked_by_ip: Option<String>,
}

impl RefreshToken {
    pub fn new(
        token_hash: String,
        user_id: String,
        family_id: Option<String>,
        session_id: Option<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            token_hash,
            user_id,
            family_id: family_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            session_id,
            created_at: now,
            expires_at: now + ttl,
            used_at: None,
            replaced_by: None,
            revoked_at: None,
            revoked_reason: None,
            revoked_by_ip: None,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Revocation and use win over expiry so that replays are always reported
    /// as reuse.
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.is_revoked() {
            TokenStatus::Revoked
        } else if self.is_used() {
            TokenStatus::Used
        } else if self.is_expired_at(now) {
            TokenStatus::Expired
        } else {
            TokenStatus::Active
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == TokenStatus::Active
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>, replaced_by: &str) {
        self.used_at = Some(now);
        self.replaced_by = Some(replaced_by.to_string());
    }

    pub fn revoke(&mut self, now: DateTime<Utc>, reason: RevocationReason, ip: Option<String>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(now);
            self.revoked_reason = Some(reason.as_str().to_string());
            self.revoked_by_ip = ip;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(now: DateTime<Utc>) -> RefreshToken {
        RefreshToken::new("hash".into(), "u1".into(), None, None, now, Duration::hours(8))
    }

    #[test]
    fn test_new_token_is_active_until_ttl() {
        let now = Utc::now();
        let t = token(now);

        assert_eq!(t.status_at(now), TokenStatus::Active);
        assert_eq!(t.status_at(now + Duration::hours(7)), TokenStatus::Active);
        assert_eq!(t.status_at(now + Duration::hours(8)), TokenStatus::Expired);
        assert!(!t.family_id.is_empty());
    }

    #[test]
    fn test_used_and_revoked_take_precedence_over_expiry() {
        let now = Utc::now();
        let mut t = token(now);
        t.mark_used(now, "next");
        assert_eq!(t.status_at(now + Duration::days(2)), TokenStatus::Used);
        assert_eq!(t.replaced_by.as_deref(), Some("next"));

        t.revoke(now, RevocationReason::ReuseDetected, None);
        assert_eq!(t.status_at(now + Duration::days(2)), TokenStatus::Revoked);
    }

    #[test]
    fn test_revoke_keeps_first_reason() {
        let now = Utc::now();
        let mut t = token(now);
        t.revoke(now, RevocationReason::Logout, Some("10.0.0.1".into()));
        t.revoke(now + Duration::minutes(1), RevocationReason::Admin, None);

        assert_eq!(t.revoked_at, Some(now));
        assert_eq!(t.revoked_reason.as_deref(), Some("logout"));
        assert_eq!(t.revoked_by_ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_unknown_reason_is_rejected() {
        assert_eq!("reuse_detected".parse::<RevocationReason>(), Ok(RevocationReason::ReuseDetected));
        assert!("stolen".parse::<RevocationReason>().is_err());
    }
}
