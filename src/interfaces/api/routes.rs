use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::common::di::AppState;
use crate::interfaces::api::handlers::{auth_handler, security_handler, session_handler};
use crate::interfaces::middleware::auth::{auth_middleware, ip_block_guard, require_admin};

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds the `/api` router
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    let public = auth_handler::auth_routes()
        .layer(middleware::from_fn_with_state(state.clone(), ip_block_guard));

    let admin = security_handler::security_routes()
        .layer(middleware::from_fn(require_admin));

    let protected = auth_handler::account_routes()
        .nest("/sessions", session_handler::session_routes())
        .nest("/security", admin)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
