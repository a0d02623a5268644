use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::blocked_ip::{BlockedIp, IpWhitelistEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockIpDto {
    pub ip_address: String,
    pub reason: String,
    /// Omit for a permanent block
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistIpDto {
    pub ip_address: String,
    #[serde(default)]
    pub is_admin: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedIpDto {
    pub ip_address: String,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub permanent: bool,
    pub is_automatic: bool,
}

impl From<BlockedIp> for BlockedIpDto {
    fn from(block: BlockedIp) -> Self {
        Self {
            permanent: block.is_permanent(),
            ip_address: block.ip_address,
            reason: block.reason,
            blocked_at: block.blocked_at,
            expires_at: block.expires_at,
            is_automatic: block.is_automatic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistEntryDto {
    pub ip_address: String,
    pub is_admin: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<IpWhitelistEntry> for WhitelistEntryDto {
    fn from(entry: IpWhitelistEntry) -> Self {
        Self {
            ip_address: entry.ip_address,
            is_admin: entry.is_admin,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}
