// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{engine::EngineError, imagehost::UploadError, store::StoreError};

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

    // 403 Forbidden (not the owner of the document)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (duplicate username, action not allowed in the current phase)
    Conflict(String),

    // 502 Bad Gateway (image host failed)
    BadGateway(String),

    // 503 Service Unavailable (a write failed; the request can be retried)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

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
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Write failed: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Could not save your progress. Please try again.".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(msg) => AppError::NotFound(msg),
            EngineError::Validation(msg) => AppError::BadRequest(msg),
            EngineError::Persistence(e) => AppError::ServiceUnavailable(e.to_string()),
            e @ (EngineError::InvalidTransition { .. } | EngineError::Discarded) => {
                AppError::Conflict(e.to_string())
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NotConfigured => {
                AppError::BadGateway("Image uploads are not available.".to_string())
            }
            other => AppError::BadGateway(format!("Image upload failed: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Phase;

    #[test]
    fn engine_errors_map_to_statuses() {
        let status = |e: EngineError| AppError::from(e).into_response().status();

        assert_eq!(
            status(EngineError::NotFound("quiz".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(EngineError::Validation("topic".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(EngineError::InvalidTransition {
                action: "advance",
                phase: Phase::InProgress(0),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(EngineError::Persistence(StoreError::Unavailable("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status(EngineError::Discarded), StatusCode::CONFLICT);
    }
}
