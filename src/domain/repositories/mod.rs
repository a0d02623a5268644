pub mod blocked_ip_repository;
pub mod ip_security_event_repository;
pub mod ip_whitelist_repository;
pub mod session_repository;
pub mod token_repository;
pub mod two_factor_repository;
pub mod user_repository;

use crate::common::errors::DomainError;

/// Errors raised by persistence adapters
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Transient failure: pool exhausted, connection refused, ...
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => DomainError::not_found("Record", msg),
            RepositoryError::AlreadyExists(msg) => DomainError::already_exists("Record", msg),
            RepositoryError::Unavailable(msg) => DomainError::unavailable("Database", msg),
            RepositoryError::DatabaseError(msg) => DomainError::internal_error("Database", msg),
        }
    }
}
