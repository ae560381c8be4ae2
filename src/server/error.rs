// src/server/error.rs

//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// Route error, rendered as `{ok: false, message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or wrong credentials. The message never says which.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A required secret or credential is not configured.
    #[error("misconfigured: {0}")]
    Misconfigured(String),

    #[error("internal error: {0}")]
    Internal(AppError),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(message) => Self::BadRequest(message),
            AppError::Unauthorized(message) => Self::Unauthorized(message),
            AppError::NotFound(message) => Self::NotFound(message),
            AppError::Config(message) => Self::Misconfigured(message),
            other => Self::Internal(other),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Misconfigured(message) => {
                tracing::error!(%message, "server misconfigured");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { ok: false, message })).into_response()
    }
}
