pub mod blocked_ip_pg_repository;
pub mod ip_security_event_pg_repository;
pub mod ip_whitelist_pg_repository;
pub mod session_pg_repository;
pub mod token_pg_repository;
pub mod two_factor_pg_repository;
pub mod user_pg_repository;

pub use blocked_ip_pg_repository::BlockedIpPgRepository;
pub use ip_security_event_pg_repository::IpSecurityEventPgRepository;
pub use ip_whitelist_pg_repository::IpWhitelistPgRepository;
pub use session_pg_repository::SessionPgRepository;
pub use token_pg_repository::TokenPgRepository;
pub use two_factor_pg_repository::TwoFactorPgRepository;
pub use user_pg_repository::UserPgRepository;

use crate::domain::repositories::RepositoryError;

/// Maps driver errors onto repository errors.
///
/// Pool and I/O failures are transient and become `Unavailable` so callers
/// can fail closed or answer 503 instead of 500.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db_err) => {
            // 23505: unique_violation
            if db_err.code().map_or(false, |code| code == "23505") {
                RepositoryError::AlreadyExists(db_err.message().to_string())
            } else {
                RepositoryError::DatabaseError(format!("Database error: {}", db_err))
            }
        }
        _ => RepositoryError::DatabaseError(format!("Database error: {}", err)),
    }
}
