// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::cbt::CbtError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate admission number)
    Conflict(String),

    // 503 Service Unavailable (transient store failure, safe to retry)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Transient failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Temporarily unavailable, please retry".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Maps lifecycle engine outcomes to user-facing responses. None of these
/// are fatal to the serving process; the client gets a message and either
/// retries or is redirected.
impl From<CbtError> for AppError {
    fn from(err: CbtError) -> Self {
        match err {
            CbtError::NotEligible => {
                AppError::NotFound("This test is not available for you".to_string())
            }
            CbtError::NotStarted => {
                AppError::BadRequest("This test has not opened yet".to_string())
            }
            CbtError::Closed => AppError::BadRequest("This test window has closed".to_string()),
            CbtError::TimeExpired => {
                AppError::Conflict("Time is up for this test".to_string())
            }
            CbtError::AlreadySubmitted => {
                AppError::Conflict("You have already submitted this test".to_string())
            }
            CbtError::NoQuestions => {
                AppError::NotFound("This test has no questions yet".to_string())
            }
            CbtError::AttemptMismatch => {
                AppError::BadRequest("Attempt does not match this test and student".to_string())
            }
            CbtError::Transient(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}
