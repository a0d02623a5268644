//! ESS portal authentication service
//!
//! Handles sign-in for the employee self-service portal:
//!
//! - Bounded concurrent sessions per employee, with eviction of the oldest device
//! - Single-use refresh tokens with replay detection
//! - Per-address failure tracking, automatic blocking and an admin whitelist
//! - Optional emailed one-time codes as a second factor
//! - Background cleanup of expired sessions, tokens and security events
//!
//! Layers follow the usual hexagonal split: domain (entities, repository
//! traits), application (use cases, ports), infrastructure (PostgreSQL
//! adapters, schedulers) and interfaces (axum routes and middleware).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ess_portal::common::auth_factory::create_auth_services;
use ess_portal::common::clock::{Clock, SystemClock};
use ess_portal::common::config::AppConfig;
use ess_portal::common::db::{create_database_pool, ensure_schema};
use ess_portal::common::di::AppState;
use ess_portal::infrastructure::services::cleanup_scheduler::CleanupScheduler;
use ess_portal::interfaces::create_api_routes;

/// Accepts hostnames and bare IPv6 literals such as `::`
async fn bind_listener(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let pool = Arc::new(create_database_pool(&config).await?);
    ensure_schema(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = create_auth_services(&config, pool.clone(), clock).await?;

    let shutdown = CancellationToken::new();
    let jobs: Vec<_> = [
        CleanupScheduler::new(
            services.session_maintenance.clone(),
            config.cleanup.session_cleanup_interval(),
            config.cleanup.session_cleanup_enabled,
        ),
        CleanupScheduler::new(
            services.security_event_retention.clone(),
            config.cleanup.security_event_cleanup_interval(),
            config.cleanup.security_event_cleanup_enabled,
        ),
    ]
    .into_iter()
    .filter_map(|scheduler| scheduler.start(shutdown.clone()))
    .collect();

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::new(config, &services));

    let app = Router::new()
        .nest("/api", create_api_routes(state))
        .layer(CorsLayer::permissive());

    let listener = bind_listener(&host, port).await?;
    tracing::info!("Starting ESS portal auth service on {}", listener.local_addr()?);

    let signal_token = shutdown.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
            signal_token.cancel();
        })
        .await?;

    // In case the server stopped for another reason
    shutdown.cancel();
    for job in jobs {
        if let Err(e) = job.await {
            tracing::error!("Cleanup job ended abnormally: {}", e);
        }
    }

    pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
