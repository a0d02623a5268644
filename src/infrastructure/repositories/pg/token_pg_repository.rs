use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::entities::refresh_token::{RefreshToken, RevocationReason};
use crate::domain::repositories::token_repository::{RotationOutcome, TokenRepository};
use crate::domain::repositories::RepositoryResult;
use crate::infrastructure::repositories::pg::map_sqlx_error;

const TOKEN_COLUMNS: &str = "id, token_hash, user_id, family_id, session_id, created_at, expires_at, \
                             used_at, replaced_by, revoked_at, revoked_reason, revoked_by_ip";

/// Rows that can still be exchanged at `$now`
const ACTIVE_AT: &str = "revoked_at IS NULL AND used_at IS NULL AND expires_at > $1";

fn token_from_row(row: &PgRow) -> Result<RefreshToken, sqlx::Error> {
    Ok(RefreshToken {
        id: row.try_get("id")?,
        token_hash: row.try_get("token_hash")?,
        user_id: row.try_get("user_id")?,
        family_id: row.try_get("family_id")?,
        session_id: row.try_get("session_id")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        used_at: row.try_get("used_at")?,
        replaced_by: row.try_get("replaced_by")?,
        revoked_at: row.try_get("revoked_at")?,
        revoked_reason: row.try_get("revoked_reason")?,
        revoked_by_ip: row.try_get("revoked_by_ip")?,
    })
}

pub struct TokenPgRepository {
    pool: Arc<PgPool>,
}

impl TokenPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Revokes active tokens matching `filter`, whose only parameter is `$5`
    async fn revoke_matching(
        &self,
        filter: &str,
        value: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let sql = format!(
            "UPDATE auth.refresh_tokens \
             SET revoked_at = $2, revoked_reason = $3, revoked_by_ip = $4 \
             WHERE {} AND {}",
            ACTIVE_AT, filter
        );

        let result = sqlx::query(&sql)
            .bind(now)
            .bind(now)
            .bind(reason.as_str())
            .bind(revoked_by_ip)
            .bind(value)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenRepository for TokenPgRepository {
    async fn create_token(&self, token: &RefreshToken) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth.refresh_tokens (
                id, token_hash, user_id, family_id, session_id, created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&token.id)
        .bind(&token.token_hash)
        .bind(&token.user_id)
        .bind(&token.family_id)
        .bind(&token.session_id)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM auth.refresh_tokens WHERE token_hash = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(token_from_row).transpose().map_err(map_sqlx_error)
    }

    async fn rotate_token(
        &self,
        token_hash: &str,
        successor: RefreshToken,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RotationOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM auth.refresh_tokens WHERE token_hash = $1 FOR UPDATE",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut previous = match row {
            Some(row) => token_from_row(&row).map_err(map_sqlx_error)?,
            None => return Ok(RotationOutcome::NotFound),
        };

        if !previous.is_active_at(now) {
            // Dropping the transaction rolls it back
            return Ok(RotationOutcome::Rejected(previous));
        }

        sqlx::query(
            r#"
            UPDATE auth.refresh_tokens
            SET used_at = $2, replaced_by = $3
            WHERE id = $1
            "#,
        )
        .bind(&previous.id)
        .bind(now)
        .bind(&successor.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO auth.refresh_tokens (
                id, token_hash, user_id, family_id, session_id, created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&successor.id)
        .bind(&successor.token_hash)
        .bind(&successor.user_id)
        .bind(&successor.family_id)
        .bind(&successor.session_id)
        .bind(successor.created_at)
        .bind(successor.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        previous.mark_used(now, &successor.id);
        Ok(RotationOutcome::Rotated { previous, successor })
    }

    async fn revoke_token(
        &self,
        token_hash: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth.refresh_tokens
            SET revoked_at = $2, revoked_reason = $3, revoked_by_ip = $4
            WHERE token_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .bind(reason.as_str())
        .bind(revoked_by_ip)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_family(
        &self,
        family_id: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        self.revoke_matching("family_id = $5", family_id, reason, revoked_by_ip, now)
            .await
    }

    async fn revoke_user_tokens(
        &self,
        user_id: &str,
        reason: RevocationReason,
        revoked_by_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        self.revoke_matching("user_id = $5", user_id, reason, revoked_by_ip, now)
            .await
    }

    async fn revoke_session_tokens(
        &self,
        session_id: &str,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        self.revoke_matching("session_id = $5", session_id, reason, None, now)
            .await
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM auth.refresh_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM auth.refresh_tokens WHERE created_at < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
