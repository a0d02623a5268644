use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id().to_string(),
            username: user.username().to_string(),
            email: user.email().to_string(),
            role: user.role().to_string(),
            two_factor_enabled: user.two_factor_enabled(),
            last_login_at: user.last_login_at(),
        }
    }
}

/// Request origin as seen by the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: IpAddr,
    pub user_agent: Option<String>,
    pub device_fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginDto {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TwoFactorVerifyDto {
    pub challenge_id: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponseDto {
    pub user: UserDto,
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Login either completes or asks for the second factor
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponseDto {
    Authenticated(AuthResponseDto),
    TwoFactorRequired { challenge_id: String, expires_in: i64 },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordDto {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenDto {
    pub refresh_token: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogoutDto {
    pub refresh_token: Option<String>,
}
