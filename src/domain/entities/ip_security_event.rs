use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::blocked_ip::address_key;

/// Authentication operation an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityOperation {
    Login,
    TwoFactor,
    TokenRefresh,
    PasswordChange,
    Logout,
}

impl SecurityOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityOperation::Login => "login",
            SecurityOperation::TwoFactor => "two_factor",
            SecurityOperation::TokenRefresh => "token_refresh",
            SecurityOperation::PasswordChange => "password_change",
            SecurityOperation::Logout => "logout",
        }
    }
}

impl TryFrom<&str> for SecurityOperation {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "login" => Ok(SecurityOperation::Login),
            "two_factor" => Ok(SecurityOperation::TwoFactor),
            "token_refresh" => Ok(SecurityOperation::TokenRefresh),
            "password_change" => Ok(SecurityOperation::PasswordChange),
            "logout" => Ok(SecurityOperation::Logout),
            other => Err(format!("unknown security operation: {}", other)),
        }
    }
}

impl fmt::Display for SecurityOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityOutcome {
    Success,
    Failure,
    /// Request refused because the address was blocked
    Blocked,
}

impl SecurityOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityOutcome::Success => "success",
            SecurityOutcome::Failure => "failure",
            SecurityOutcome::Blocked => "blocked",
        }
    }
}

impl TryFrom<&str> for SecurityOutcome {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "success" => Ok(SecurityOutcome::Success),
            "failure" => Ok(SecurityOutcome::Failure),
            "blocked" => Ok(SecurityOutcome::Blocked),
            other => Err(format!("unknown security outcome: {}", other)),
        }
    }
}

impl fmt::Display for SecurityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of an authentication attempt from an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpSecurityEvent {
    pub id: String,
    pub ip_address: String,
    pub operation: SecurityOperation,
    pub outcome: SecurityOutcome,
    pub user_id: Option<String>,
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl IpSecurityEvent {
    pub fn new(
        ip: IpAddr,
        operation: SecurityOperation,
        outcome: SecurityOutcome,
        user_id: Option<String>,
        detail: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ip_address: address_key(ip),
            operation,
            outcome,
            user_id,
            detail,
            occurred_at,
        }
    }
}
