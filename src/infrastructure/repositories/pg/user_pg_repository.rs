use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::entities::user::{User, UserRole};
use crate::domain::repositories::user_repository::UserRepository;
use crate::domain::repositories::{RepositoryError, RepositoryResult};
use crate::infrastructure::repositories::pg::map_sqlx_error;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, two_factor_enabled, \
                            active, created_at, updated_at, last_login_at";

fn user_from_row(row: &PgRow) -> RepositoryResult<User> {
    let role_str: String = row.try_get("role").map_err(map_sqlx_error)?;
    let role = UserRole::try_from(role_str.as_str())
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

    Ok(User::from_data(
        row.try_get("id").map_err(map_sqlx_error)?,
        row.try_get("username").map_err(map_sqlx_error)?,
        row.try_get("email").map_err(map_sqlx_error)?,
        row.try_get("password_hash").map_err(map_sqlx_error)?,
        role,
        row.try_get("two_factor_enabled").map_err(map_sqlx_error)?,
        row.try_get("active").map_err(map_sqlx_error)?,
        row.try_get("created_at").map_err(map_sqlx_error)?,
        row.try_get("updated_at").map_err(map_sqlx_error)?,
        row.try_get("last_login_at").map_err(map_sqlx_error)?,
    ))
}

/// Accounts live in `auth.users`; rows are provisioned by the ERP sync job
pub struct UserPgRepository {
    pool: Arc<PgPool>,
}

impl UserPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM auth.users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl UserRepository for UserPgRepository {
    async fn get_user_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        self.find_one("id", id).await
    }

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.find_one("username", username).await
    }

    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            UPDATE auth.users
            SET last_login_at = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE auth.users
            SET password_hash = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("User {}", user_id)));
        }

        Ok(())
    }
}
