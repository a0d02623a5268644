use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::application::dtos::user_dto::ClientInfo;
use crate::common::di::AppState;
use crate::common::errors::{AppError, DomainError, ErrorKind};

/// Authenticated caller, inserted into request extensions by [`auth_middleware`]
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role: String,
    pub session_id: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn reject_blocked(state: &AppState, client: &ClientInfo) -> Result<(), AppError> {
    match state.ip_security_service.is_blocked(client.ip).await {
        Ok(false) => Ok(()),
        Ok(true) => {
            tracing::warn!("Request from blocked address {}", client.ip);
            Err(AppError::forbidden("Access from this address is blocked"))
        }
        Err(e) => {
            tracing::error!("Block check failed for {}: {}", client.ip, e);
            Err(AppError::service_unavailable(
                "Service temporarily unavailable, please try again",
            ))
        }
    }
}

/// Refuses blocked addresses before public auth endpoints run
pub async fn ip_block_guard(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    reject_blocked(&state, &client).await?;
    Ok(next.run(request).await)
}

/// Blocked address → 403, bad or expired JWT → 401, ended session → 401
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    reject_blocked(&state, &client).await?;

    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let claims = state.auth_service.validate_token(token).map_err(|e| {
        tracing::debug!("Rejected access token: {}", e);
        let err: DomainError = e.into();
        if err.kind == ErrorKind::Expired {
            AppError::unauthorized("Token expired")
        } else {
            AppError::unauthorized("Invalid token")
        }
    })?;

    if !state.session_service.validate_session(&claims.sid).await {
        return Err(AppError::unauthorized("Session expired, please sign in"));
    }

    request.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        username: claims.username,
        role: claims.role,
        session_id: claims.sid,
    });

    Ok(next.run(request).await)
}

/// Must run after [`auth_middleware`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    match request.extensions().get::<CurrentUser>() {
        Some(user) if user.is_admin() => Ok(next.run(request).await),
        Some(user) => {
            tracing::warn!("User {} attempted an admin operation", user.username);
            Err(AppError::forbidden("Administrator role required"))
        }
        None => Err(AppError::unauthorized("Authentication required")),
    }
}
