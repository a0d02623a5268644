use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::Duration;

use crate::application::dtos::security_dto::{BlockIpDto, BlockedIpDto, WhitelistEntryDto, WhitelistIpDto};
use crate::common::di::AppState;
use crate::common::errors::AppError;
use crate::interfaces::middleware::auth::CurrentUser;

/// Admin-only IP management
pub fn security_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/blocked-ips", get(list_blocked).post(block_ip))
        .route("/blocked-ips/{ip}", delete(unblock_ip))
        .route("/whitelist", get(list_whitelist).post(add_to_whitelist))
        .route("/whitelist/{ip}", delete(remove_from_whitelist))
}

fn parse_ip(raw: &str) -> Result<IpAddr, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid IP address: {}", raw)))
}

async fn list_blocked(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let blocks = state
        .ip_security_service
        .list_blocked_ips()
        .await?
        .into_iter()
        .map(BlockedIpDto::from)
        .collect::<Vec<_>>();

    Ok(Json(blocks))
}

async fn block_ip(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<CurrentUser>,
    Json(dto): Json<BlockIpDto>,
) -> Result<impl IntoResponse, AppError> {
    let ip = parse_ip(&dto.ip_address)?;
    let duration = match dto.duration_minutes {
        Some(minutes) if minutes <= 0 => {
            return Err(AppError::bad_request("duration_minutes must be positive"));
        }
        Some(minutes) => Some(Duration::minutes(minutes)),
        None => None,
    };
    if dto.reason.trim().is_empty() {
        return Err(AppError::bad_request("A reason is required"));
    }

    let block = state
        .ip_security_service
        .block_ip(ip, &dto.reason, duration, false)
        .await?;

    tracing::info!("Admin {} blocked {}", admin.username, ip);
    Ok((StatusCode::CREATED, Json(BlockedIpDto::from(block))))
}

async fn unblock_ip(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<CurrentUser>,
    Path(raw_ip): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ip = parse_ip(&raw_ip)?;

    if !state.ip_security_service.unblock_ip(ip).await? {
        return Err(AppError::not_found(format!("{} is not blocked", ip)));
    }

    tracing::info!("Admin {} unblocked {}", admin.username, ip);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_whitelist(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let entries = state
        .ip_security_service
        .list_whitelist()
        .await?
        .into_iter()
        .map(WhitelistEntryDto::from)
        .collect::<Vec<_>>();

    Ok(Json(entries))
}

async fn add_to_whitelist(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<CurrentUser>,
    Json(dto): Json<WhitelistIpDto>,
) -> Result<impl IntoResponse, AppError> {
    let ip = parse_ip(&dto.ip_address)?;

    let entry = state
        .ip_security_service
        .add_to_whitelist(ip, dto.is_admin, dto.description)
        .await?;

    tracing::info!("Admin {} whitelisted {}", admin.username, ip);
    Ok((StatusCode::CREATED, Json(WhitelistEntryDto::from(entry))))
}

async fn remove_from_whitelist(
    State(state): State<Arc<AppState>>,
    Path(raw_ip): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ip = parse_ip(&raw_ip)?;

    if !state.ip_security_service.remove_from_whitelist(ip).await? {
        return Err(AppError::not_found(format!("{} is not whitelisted", ip)));
    }

    Ok(StatusCode::NO_CONTENT)
}
