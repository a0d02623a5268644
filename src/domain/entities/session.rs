use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated device session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub device_fingerprint: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: String,
        device_fingerprint: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            device_fingerprint,
            ip_address,
            user_agent,
            created_at: now,
            last_activity_at: now,
            expires_at: now + timeout,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }

    /// Slides the expiry window forward from `now`
    pub fn touch(&mut self, now: DateTime<Utc>, timeout: Duration) {
        self.last_activity_at = now;
        self.expires_at = now + timeout;
    }
}

/// Picks the sessions to drop so that a new one fits under `max_concurrent`.
///
/// Only sessions still active at `now` count; the oldest by creation time go
/// first.
pub fn sessions_to_evict(sessions: &[Session], max_concurrent: usize, now: DateTime<Utc>) -> Vec<String> {
    let mut active: Vec<&Session> = sessions.iter().filter(|s| s.is_active_at(now)).collect();
    let keep = max_concurrent.saturating_sub(1);

    if active.len() <= keep {
        return Vec::new();
    }

    active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    let excess = active.len() - keep;

    active.into_iter().take(excess).map(|s| s.id.clone()).collect()
}
