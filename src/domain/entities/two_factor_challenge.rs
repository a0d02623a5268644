use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One-time code issued after a correct password when 2FA is on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorChallenge {
    pub id: String,
    pub user_id: String,
    /// SHA-256 hex digest of the code
    pub code_hash: String,
    pub device_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl TwoFactorChallenge {
    pub fn new(
        user_id: String,
        code_hash: String,
        device_fingerprint: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            code_hash,
            device_fingerprint,
            created_at: now,
            expires_at: now + ttl,
            attempts: 0,
            consumed_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}
