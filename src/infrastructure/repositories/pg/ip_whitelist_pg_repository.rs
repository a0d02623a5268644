use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::entities::blocked_ip::IpWhitelistEntry;
use crate::domain::repositories::ip_whitelist_repository::IpWhitelistRepository;
use crate::domain::repositories::RepositoryResult;
use crate::infrastructure::repositories::pg::map_sqlx_error;

fn entry_from_row(row: &PgRow) -> Result<IpWhitelistEntry, sqlx::Error> {
    Ok(IpWhitelistEntry {
        ip_address: row.try_get("ip_address")?,
        is_admin: row.try_get("is_admin")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

pub struct IpWhitelistPgRepository {
    pool: Arc<PgPool>,
}

impl IpWhitelistPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IpWhitelistRepository for IpWhitelistPgRepository {
    async fn upsert_entry(&self, entry: &IpWhitelistEntry) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth.ip_whitelist (ip_address, is_admin, description, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (ip_address) DO UPDATE
            SET is_admin = EXCLUDED.is_admin, description = EXCLUDED.description
            "#,
        )
        .bind(&entry.ip_address)
        .bind(entry.is_admin)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_entry(&self, ip_address: &str) -> RepositoryResult<Option<IpWhitelistEntry>> {
        let row = sqlx::query(
            "SELECT ip_address, is_admin, description, created_at FROM auth.ip_whitelist WHERE ip_address = $1",
        )
        .bind(ip_address)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(entry_from_row).transpose().map_err(map_sqlx_error)
    }

    async fn remove_entry(&self, ip_address: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM auth.ip_whitelist WHERE ip_address = $1")
            .bind(ip_address)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_entries(&self) -> RepositoryResult<Vec<IpWhitelistEntry>> {
        let rows = sqlx::query(
            "SELECT ip_address, is_admin, description, created_at FROM auth.ip_whitelist ORDER BY created_at",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }
}
