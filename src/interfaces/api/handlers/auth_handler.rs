use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Router,
};

use crate::application::dtos::user_dto::{
    ChangePasswordDto, ClientInfo, LoginDto, LogoutDto, RefreshTokenDto, TwoFactorVerifyDto,
};
use crate::common::di::AppState;
use crate::common::errors::AppError;
use crate::interfaces::middleware::auth::CurrentUser;

/// `/auth` endpoints reachable without an access token
pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/2fa/verify", post(verify_two_factor))
        .route("/auth/refresh", post(refresh_token))
}

/// Endpoints that need an authenticated session
pub fn account_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
        .route("/auth/change-password", put(change_password))
}

async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(dto): Json<LoginDto>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_application_service.login(dto, client).await?;
    Ok(Json(response))
}

async fn verify_two_factor(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(dto): Json<TwoFactorVerifyDto>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_application_service.verify_two_factor(dto, client).await?;
    Ok(Json(response))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(dto): Json<RefreshTokenDto>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_application_service.refresh(dto, client).await?;
    Ok(Json(response))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    body: Option<Json<LogoutDto>>,
) -> Result<impl IntoResponse, AppError> {
    let dto = body.map(|Json(dto)| dto).unwrap_or_default();

    state
        .auth_application_service
        .logout(&current_user.id, &current_user.session_id, dto.refresh_token, client)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn logout_all(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
) -> Result<impl IntoResponse, AppError> {
    let ended = state
        .auth_application_service
        .logout_all(&current_user.id, client)
        .await?;

    Ok(Json(serde_json::json!({ "sessions_ended": ended })))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Json(dto): Json<ChangePasswordDto>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_application_service
        .change_password(&current_user.id, dto, client)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
