use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};

use crate::application::dtos::session_dto::SessionDto;
use crate::common::di::AppState;
use crate::common::errors::{AppError, ErrorKind};
use crate::domain::entities::refresh_token::RevocationReason;
use crate::interfaces::middleware::auth::CurrentUser;

pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_sessions))
        .route("/{id}", delete(end_session))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state
        .session_service
        .list_active_sessions(&current_user.id)
        .await?
        .into_iter()
        .map(|s| SessionDto::from_session(s, &current_user.session_id))
        .collect::<Vec<_>>();

    Ok(Json(sessions))
}

/// Signs one of the caller's own devices out
async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = match state.session_service.get_session(&id).await {
        Ok(session) => session,
        Err(e) if e.kind == ErrorKind::NotFound => return Err(AppError::not_found("Session not found")),
        Err(e) => return Err(e.into()),
    };

    // Other users' sessions are indistinguishable from missing ones
    if session.user_id != current_user.id {
        return Err(AppError::not_found("Session not found"));
    }

    state
        .session_service
        .end_session(&id, RevocationReason::Logout)
        .await?;

    tracing::info!("User {} ended session {}", current_user.username, id);
    Ok(StatusCode::NO_CONTENT)
}
