use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

pub type UserResult<T> = Result<T, UserError>;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Employee,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Employee => write!(f, "employee"),
        }
    }
}

impl TryFrom<&str> for UserRole {
    type Error = UserError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "admin" => Ok(UserRole::Admin),
            "employee" => Ok(UserRole::Employee),
            other => Err(UserError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

/// Portal account; provisioned from the ERP employee register
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: String,
    username: String,
    email: String,
    #[serde(skip_serializing)]
    password_hash: String,
    role: UserRole,
    two_factor_enabled: bool,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

fn hash_password(password: &str) -> UserResult<String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(UserError::InvalidPassword(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::ValidationError(format!("Could not hash password: {}", e)))
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password: &str,
        role: UserRole,
        two_factor_enabled: bool,
    ) -> UserResult<Self> {
        if username.len() < 3 || username.len() > 32 {
            return Err(UserError::InvalidUsername(
                "Username must be between 3 and 32 characters".to_string(),
            ));
        }

        if !email.contains('@') || email.len() < 5 {
            return Err(UserError::ValidationError("Invalid email".to_string()));
        }

        let password_hash = hash_password(password)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            role,
            two_factor_enabled,
            active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        })
    }

    /// Rebuilds a user from stored columns
    #[allow(clippy::too_many_arguments)]
    pub fn from_data(
        id: String,
        username: String,
        email: String,
        password_hash: String,
        role: UserRole,
        two_factor_enabled: bool,
        active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        last_login_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password_hash,
            role,
            two_factor_enabled,
            active,
            created_at,
            updated_at,
            last_login_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn two_factor_enabled(&self) -> bool {
        self.two_factor_enabled
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    pub fn verify_password(&self, password: &str) -> UserResult<bool> {
        let parsed_hash = PasswordHash::new(&self.password_hash)
            .map_err(|e| UserError::AuthenticationError(format!("Unreadable password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn update_password(&mut self, new_password: &str, now: DateTime<Utc>) -> UserResult<()> {
        self.password_hash = hash_password(new_password)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn register_login(&mut self, now: DateTime<Utc>) {
        self.last_login_at = Some(now);
        self.updated_at = now;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }
}
