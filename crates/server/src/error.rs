//! HTTP error shape: `{error, message, request_id, timestamp, path}`, with
//! one variant per taxonomy entry from the domain's error model.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, error: "not_found", message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: "validation", message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, error: "unauthorized", message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self { status: StatusCode::FORBIDDEN, error: "insufficient permissions", message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: "internal", message: message.into() }
    }
}

impl From<konsul_domain::Error> for ApiError {
    fn from(e: konsul_domain::Error) -> Self {
        use konsul_domain::Error::*;
        match e {
            NotFound(m) => ApiError::not_found(m),
            Validation(m) => ApiError::validation(m),
            Auth(m) => ApiError::unauthorized(m),
            Storage(m) | Config(m) | Other(m) => ApiError::internal(m),
            Io(e) => ApiError::internal(e.to_string()),
            Json(e) => ApiError::validation(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    request_id: String,
    timestamp: String,
    path: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // `request_id`/`path` are filled in by the error-shaping middleware
        // layered over the router; this placeholder is only hit for
        // errors that bypass it (extractor failures, etc).
        let body = ErrorBody {
            error: self.error,
            message: &self.message,
            request_id: String::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            path: String::new(),
        };
        (self.status, Json(serde_json::json!(body))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
