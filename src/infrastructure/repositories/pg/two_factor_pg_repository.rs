use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::entities::two_factor_challenge::TwoFactorChallenge;
use crate::domain::repositories::two_factor_repository::TwoFactorRepository;
use crate::domain::repositories::{RepositoryError, RepositoryResult};
use crate::infrastructure::repositories::pg::map_sqlx_error;

fn challenge_from_row(row: &PgRow) -> Result<TwoFactorChallenge, sqlx::Error> {
    Ok(TwoFactorChallenge {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        code_hash: row.try_get("code_hash")?,
        device_fingerprint: row.try_get("device_fingerprint")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        attempts: row.try_get("attempts")?,
        consumed_at: row.try_get("consumed_at")?,
    })
}

pub struct TwoFactorPgRepository {
    pool: Arc<PgPool>,
}

impl TwoFactorPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TwoFactorRepository for TwoFactorPgRepository {
    async fn create_challenge(&self, challenge: &TwoFactorChallenge) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth.two_factor_challenges (
                id, user_id, code_hash, device_fingerprint, created_at, expires_at, attempts
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&challenge.id)
        .bind(&challenge.user_id)
        .bind(&challenge.code_hash)
        .bind(&challenge.device_fingerprint)
        .bind(challenge.created_at)
        .bind(challenge.expires_at)
        .bind(challenge.attempts)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_challenge(&self, id: &str) -> RepositoryResult<Option<TwoFactorChallenge>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, code_hash, device_fingerprint, created_at, expires_at, attempts, consumed_at
            FROM auth.two_factor_challenges
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(challenge_from_row).transpose().map_err(map_sqlx_error)
    }

    async fn increment_attempts(&self, id: &str) -> RepositoryResult<i32> {
        let row = sqlx::query(
            r#"
            UPDATE auth.two_factor_challenges
            SET attempts = attempts + 1
            WHERE id = $1
            RETURNING attempts
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| RepositoryError::NotFound(format!("Challenge {}", id)))?;

        row.try_get("attempts").map_err(map_sqlx_error)
    }

    async fn mark_consumed(&self, id: &str, now: DateTime<Utc>) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE auth.two_factor_challenges SET consumed_at = $2 WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM auth.two_factor_challenges WHERE expires_at <= $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
