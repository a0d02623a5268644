use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::common::config::AppConfig;

const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Tables used by the session and IP security subsystem, applied in order
const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS auth",
    r#"
    CREATE TABLE IF NOT EXISTS auth.users (
        id VARCHAR(36) PRIMARY KEY,
        username VARCHAR(32) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role VARCHAR(16) NOT NULL,
        two_factor_enabled BOOLEAN NOT NULL DEFAULT FALSE,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        last_login_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth.sessions (
        id VARCHAR(36) PRIMARY KEY,
        user_id VARCHAR(36) NOT NULL REFERENCES auth.users(id) ON DELETE CASCADE,
        device_fingerprint TEXT NOT NULL,
        ip_address VARCHAR(45),
        user_agent TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        last_activity_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_expires ON auth.sessions(user_id, expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS auth.refresh_tokens (
        id VARCHAR(36) PRIMARY KEY,
        token_hash VARCHAR(64) NOT NULL UNIQUE,
        user_id VARCHAR(36) NOT NULL REFERENCES auth.users(id) ON DELETE CASCADE,
        family_id VARCHAR(36) NOT NULL,
        session_id VARCHAR(36),
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        used_at TIMESTAMPTZ,
        replaced_by VARCHAR(36),
        revoked_at TIMESTAMPTZ,
        revoked_reason VARCHAR(32),
        revoked_by_ip VARCHAR(45)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON auth.refresh_tokens(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_family ON auth.refresh_tokens(family_id)",
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_session ON auth.refresh_tokens(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires ON auth.refresh_tokens(expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS auth.ip_security_events (
        id VARCHAR(36) PRIMARY KEY,
        ip_address VARCHAR(45) NOT NULL,
        operation VARCHAR(32) NOT NULL,
        outcome VARCHAR(16) NOT NULL,
        user_id VARCHAR(36),
        detail TEXT,
        occurred_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ip_events_lookup ON auth.ip_security_events(ip_address, outcome, occurred_at)",
    "CREATE INDEX IF NOT EXISTS idx_ip_events_occurred ON auth.ip_security_events(occurred_at)",
    r#"
    CREATE TABLE IF NOT EXISTS auth.blocked_ips (
        ip_address VARCHAR(45) PRIMARY KEY,
        reason TEXT NOT NULL,
        blocked_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ,
        is_automatic BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth.ip_whitelist (
        ip_address VARCHAR(45) PRIMARY KEY,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth.two_factor_challenges (
        id VARCHAR(36) PRIMARY KEY,
        user_id VARCHAR(36) NOT NULL REFERENCES auth.users(id) ON DELETE CASCADE,
        code_hash VARCHAR(64) NOT NULL,
        device_fingerprint TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        consumed_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_two_factor_expires ON auth.two_factor_challenges(expires_at)",
];

fn redact(connection_string: &str) -> String {
    match (connection_string.find("://"), connection_string.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => format!(
            "{}[credentials]{}",
            &connection_string[..scheme_end + 3],
            &connection_string[at..]
        ),
        _ => connection_string.to_string(),
    }
}

/// Connects to PostgreSQL, retrying a few times before giving up
pub async fn create_database_pool(config: &AppConfig) -> Result<PgPool> {
    let db = &config.database;
    tracing::info!("Connecting to PostgreSQL at {}", redact(&db.connection_string));

    let mut attempt = 0;
    loop {
        attempt += 1;

        let result = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .min_connections(db.min_connections)
            .acquire_timeout(Duration::from_secs(db.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(db.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(db.max_lifetime_secs))
            .connect(&db.connection_string)
            .await;

        match result {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .execute(&pool)
                    .await
                    .context("PostgreSQL connection check failed")?;
                tracing::info!("PostgreSQL connection established");
                return Ok(pool);
            }
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                tracing::warn!("PostgreSQL connection attempt {} failed: {}", attempt, e);
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }
            Err(e) => {
                return Err(e).context(format!(
                    "Could not connect to PostgreSQL after {} attempts",
                    MAX_CONNECT_ATTEMPTS
                ));
            }
        }
    }
}

/// Creates the `auth` schema objects if they are missing
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Schema statement failed: {}", statement.trim()))?;
    }

    tracing::info!("Database schema verified");
    Ok(())
}
