use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::session::Session;

/// Active session as shown in the device list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDto {
    pub id: String,
    pub device_fingerprint: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// True for the session making the request
    pub current: bool,
}

impl SessionDto {
    pub fn from_session(session: Session, current_session_id: &str) -> Self {
        let current = session.id == current_session_id;
        Self {
            id: session.id,
            device_fingerprint: session.device_fingerprint,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            current,
        }
    }
}
