use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::entities::blocked_ip::BlockedIp;
use crate::domain::repositories::blocked_ip_repository::BlockedIpRepository;
use crate::domain::repositories::RepositoryResult;
use crate::infrastructure::repositories::pg::map_sqlx_error;

fn block_from_row(row: &PgRow) -> Result<BlockedIp, sqlx::Error> {
    Ok(BlockedIp {
        ip_address: row.try_get("ip_address")?,
        reason: row.try_get("reason")?,
        blocked_at: row.try_get("blocked_at")?,
        expires_at: row.try_get("expires_at")?,
        is_automatic: row.try_get("is_automatic")?,
    })
}

pub struct BlockedIpPgRepository {
    pool: Arc<PgPool>,
}

impl BlockedIpPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockedIpRepository for BlockedIpPgRepository {
    async fn upsert_block(&self, block: &BlockedIp) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth.blocked_ips (ip_address, reason, blocked_at, expires_at, is_automatic)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (ip_address) DO UPDATE
            SET reason = EXCLUDED.reason,
                blocked_at = EXCLUDED.blocked_at,
                expires_at = EXCLUDED.expires_at,
                is_automatic = EXCLUDED.is_automatic
            "#,
        )
        .bind(&block.ip_address)
        .bind(&block.reason)
        .bind(block.blocked_at)
        .bind(block.expires_at)
        .bind(block.is_automatic)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_active_block(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<BlockedIp>> {
        let row = sqlx::query(
            r#"
            SELECT ip_address, reason, blocked_at, expires_at, is_automatic
            FROM auth.blocked_ips
            WHERE ip_address = $1 AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(ip_address)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(block_from_row).transpose().map_err(map_sqlx_error)
    }

    async fn remove_block(&self, ip_address: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM auth.blocked_ips WHERE ip_address = $1")
            .bind(ip_address)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_blocks(&self) -> RepositoryResult<Vec<BlockedIp>> {
        let rows = sqlx::query(
            r#"
            SELECT ip_address, reason, blocked_at, expires_at, is_automatic
            FROM auth.blocked_ips
            ORDER BY blocked_at DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(block_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn delete_expired_blocks(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM auth.blocked_ips WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
