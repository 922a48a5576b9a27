use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repository::StoreError;

/// AppError
///
/// The single error taxonomy shared by every service and handler. Each variant maps to
/// one HTTP status, so validation, authentication, permission and lookup failures are no
/// longer collapsed into a generic 400.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Credentials were absent or did not match. Deliberately carries no detail.
    #[error("invalid credentials")]
    Auth,

    /// Authenticated, but not allowed to touch this resource or queue.
    #[error("{0}")]
    Permission(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Unique-constraint violation or a lost optimistic version race.
    #[error("{0}")]
    Conflict(String),

    /// The store did not answer in time (pool exhausted or statement timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// ErrorBody
///
/// Wire shape of every failed call: a stable `code`, a human readable `content`, and an
/// optional `exception` holding the underlying failure detail.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the response body. Store failure details are only attached outside of
    /// release builds; clients always get a generic `content`.
    pub fn body(&self) -> ErrorBody {
        let code = self.status_code().as_u16();
        match self {
            Self::Unavailable(detail) | Self::Internal(detail) => ErrorBody {
                code,
                content: "the request could not be completed".to_string(),
                exception: cfg!(debug_assertions).then(|| detail.clone()),
            },
            other => ErrorBody {
                code,
                content: other.to_string(),
                exception: None,
            },
        }
    }
}

/// Unwraps a required text field, rejecting absent and blank values alike.
pub fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.body());
        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"campus-portal\"")],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => Self::Conflict(format!("{what} already exists")),
            StoreError::Stale => {
                Self::Conflict("record was modified concurrently, retry the update".to_string())
            }
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Unavailable(detail) => Self::Unavailable(detail),
            StoreError::Backend(detail) => Self::Internal(detail),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
