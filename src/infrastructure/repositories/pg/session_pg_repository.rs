use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::entities::session::{sessions_to_evict, Session};
use crate::domain::repositories::session_repository::SessionRepository;
use crate::domain::repositories::RepositoryResult;
use crate::infrastructure::repositories::pg::map_sqlx_error;

const SESSION_COLUMNS: &str = "id, user_id, device_fingerprint, ip_address, user_agent, \
                               created_at, last_activity_at, expires_at";

fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        device_fingerprint: row.try_get("device_fingerprint")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
        last_activity_at: row.try_get("last_activity_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

pub struct SessionPgRepository {
    pool: Arc<PgPool>,
}

impl SessionPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SessionPgRepository {
    async fn create_session_with_limit(
        &self,
        session: Session,
        max_concurrent: usize,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Session>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Serialises concurrent logins of the same user until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&session.user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM auth.sessions WHERE user_id = $1 AND expires_at > $2 \
             ORDER BY created_at, id",
            SESSION_COLUMNS
        ))
        .bind(&session.user_id)
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let active = rows
            .iter()
            .map(session_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)?;

        let evict_ids = sessions_to_evict(&active, max_concurrent, now);
        if !evict_ids.is_empty() {
            sqlx::query("DELETE FROM auth.sessions WHERE id = ANY($1)")
                .bind(&evict_ids)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        sqlx::query(
            r#"
            INSERT INTO auth.sessions (
                id, user_id, device_fingerprint, ip_address, user_agent,
                created_at, last_activity_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.device_fingerprint)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(active
            .into_iter()
            .filter(|s| evict_ids.contains(&s.id))
            .collect())
    }

    async fn get_session_by_id(&self, id: &str) -> RepositoryResult<Option<Session>> {
        let row = sqlx::query(&format!("SELECT {} FROM auth.sessions WHERE id = $1", SESSION_COLUMNS))
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(session_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn get_active_sessions_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM auth.sessions WHERE user_id = $1 AND expires_at > $2 \
             ORDER BY created_at, id",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(session_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn update_session_activity(
        &self,
        id: &str,
        last_activity_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth.sessions
            SET last_activity_at = $2, expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(last_activity_at)
        .bind(expires_at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_session(&self, id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM auth.sessions WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_sessions(&self, user_id: &str) -> RepositoryResult<Vec<String>> {
        let rows = sqlx::query("DELETE FROM auth.sessions WHERE user_id = $1 RETURNING id")
            .bind(user_id)
            .fetch_all(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM auth.sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
