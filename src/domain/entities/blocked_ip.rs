use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Storage key for an address. IPv4-mapped IPv6 collapses to plain IPv4.
pub fn address_key(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}

/// Address refused at authentication time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedIp {
    pub ip_address: String,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    /// `None` means the block never lapses
    pub expires_at: Option<DateTime<Utc>>,
    /// Set by the failed-login policy rather than an administrator
    pub is_automatic: bool,
}

impl BlockedIp {
    pub fn new(
        ip: IpAddr,
        reason: String,
        now: DateTime<Utc>,
        duration: Option<Duration>,
        is_automatic: bool,
    ) -> Self {
        Self {
            ip_address: address_key(ip),
            reason,
            blocked_at: now,
            expires_at: duration.map(|d| now + d),
            is_automatic,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Address exempt from block checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpWhitelistEntry {
    pub ip_address: String,
    pub is_admin: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IpWhitelistEntry {
    pub fn new(ip: IpAddr, is_admin: bool, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            ip_address: address_key(ip),
            is_admin,
            description,
            created_at: now,
        }
    }
}
