use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::entities::ip_security_event::{IpSecurityEvent, SecurityOutcome};
use crate::domain::repositories::ip_security_event_repository::IpSecurityEventRepository;
use crate::domain::repositories::RepositoryResult;
use crate::infrastructure::repositories::pg::map_sqlx_error;

pub struct IpSecurityEventPgRepository {
    pool: Arc<PgPool>,
}

impl IpSecurityEventPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IpSecurityEventRepository for IpSecurityEventPgRepository {
    async fn record_event(&self, event: &IpSecurityEvent) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth.ip_security_events (
                id, ip_address, operation, outcome, user_id, detail, occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&event.id)
        .bind(&event.ip_address)
        .bind(event.operation.as_str())
        .bind(event.outcome.as_str())
        .bind(&event.user_id)
        .bind(&event.detail)
        .bind(event.occurred_at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn count_events_since(
        &self,
        ip_address: &str,
        outcome: SecurityOutcome,
        since: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM auth.ip_security_events
            WHERE ip_address = $1 AND outcome = $2 AND occurred_at >= $3
            "#,
        )
        .bind(ip_address)
        .bind(outcome.as_str())
        .bind(since)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.try_get("total").map_err(map_sqlx_error)
    }

    async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM auth.ip_security_events WHERE occurred_at < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
