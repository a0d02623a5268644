use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Error categories shared by every layer of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity not found
    NotFound,
    /// Entity already exists
    AlreadyExists,
    /// Invalid input or failed validation
    InvalidInput,
    /// Authentication or permission failure
    AccessDenied,
    /// Session, token or challenge past its lifetime
    Expired,
    /// State does not allow the operation (used/revoked token, consumed challenge)
    Conflict,
    /// Transient infrastructure failure (store unreachable, pool exhausted)
    Unavailable,
    /// Unexpected internal failure
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ErrorKind::NotFound => write!(f, "Not Found"),
            ErrorKind::AlreadyExists => write!(f, "Already Exists"),
            ErrorKind::InvalidInput => write!(f, "Invalid Input"),
            ErrorKind::AccessDenied => write!(f, "Access Denied"),
            ErrorKind::Expired => write!(f, "Expired"),
            ErrorKind::Conflict => write!(f, "Conflict"),
            ErrorKind::Unavailable => write!(f, "Unavailable"),
            ErrorKind::InternalError => write!(f, "Internal Error"),
        }
    }
}

/// Domain error carrying the affected entity and an optional source
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct DomainError {
    pub kind: ErrorKind,
    /// Entity type involved ("Session", "RefreshToken", ...)
    pub entity_type: &'static str,
    pub entity_id: Option<String>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl DomainError {
    pub fn new<S: Into<String>>(kind: ErrorKind, entity_type: &'static str, message: S) -> Self {
        Self {
            kind,
            entity_type,
            entity_id: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found<S: Into<String>>(entity_type: &'static str, entity_id: S) -> Self {
        let id = entity_id.into();
        Self {
            kind: ErrorKind::NotFound,
            entity_type,
            entity_id: Some(id.clone()),
            message: format!("{} not found: {}", entity_type, id),
            source: None,
        }
    }

    pub fn already_exists<S: Into<String>>(entity_type: &'static str, entity_id: S) -> Self {
        let id = entity_id.into();
        Self {
            kind: ErrorKind::AlreadyExists,
            entity_type,
            entity_id: Some(id.clone()),
            message: format!("{} already exists: {}", entity_type, id),
            source: None,
        }
    }

    pub fn unavailable<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self::new(ErrorKind::Unavailable, entity_type, message)
    }

    pub fn internal_error<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self::new(ErrorKind::InternalError, entity_type, message)
    }

    pub fn access_denied<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self::new(ErrorKind::AccessDenied, entity_type, message)
    }

    pub fn validation_error<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self::new(ErrorKind::InvalidInput, entity_type, message)
    }

    pub fn expired<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self::new(ErrorKind::Expired, entity_type, message)
    }

    pub fn conflict<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self::new(ErrorKind::Conflict, entity_type, message)
    }

    pub fn with_id<S: Into<String>>(mut self, entity_id: S) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_source<E: StdError + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Error returned by HTTP handlers
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err.kind {
            ErrorKind::NotFound => AppError::not_found(err.message),
            ErrorKind::AlreadyExists | ErrorKind::Conflict => {
                AppError::new(StatusCode::CONFLICT, err.message)
            }
            ErrorKind::InvalidInput => AppError::bad_request(err.message),
            ErrorKind::AccessDenied | ErrorKind::Expired => AppError::unauthorized(err.message),
            ErrorKind::Unavailable => {
                tracing::error!("Store unavailable ({}): {}", err.entity_type, err.message);
                AppError::service_unavailable("Service temporarily unavailable, please try again")
            }
            ErrorKind::InternalError => {
                tracing::error!("Internal error ({}): {}", err.entity_type, err.message);
                AppError::internal_error("Something went wrong, please try again")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}
