//! # Error Handling
//!
//! HTTP-facing error type and its conversion to JSON responses.
//!
//! ## Error Layers:
//! - **EngineError** (`intent::error`): what went wrong inside the
//!   matching engine
//! - **AppError** (this module): what the HTTP client is told
//!
//! Handlers return `AppResult<T>`; `?` converts engine and JSON errors on
//! the way out.
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "service_unavailable",
//!     "message": "embedding backend unavailable: model weights not found",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use crate::intent::EngineError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Server-side failures (500)
    Internal(String),

    /// Client sent invalid or malformed data (400)
    BadRequest(String),

    /// Input failed validation rules (400)
    ValidationError(String),

    /// The command parser could not be initialized (503)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.parts();

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Engine errors that block every request become 503, the rest 500.
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        if err.is_unavailable() {
            AppError::ServiceUnavailable(err.to_string())
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

/// JSON parsing errors are almost always the client's fault.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_status_mapping() {
        let unavailable: AppError = EngineError::BackendUnavailable("offline".into()).into();
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let empty: AppError = EngineError::EmptyCatalogue.into();
        assert_eq!(empty.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let mismatch: AppError = EngineError::DimensionMismatch { left: 384, right: 768 }.into();
        assert_eq!(mismatch.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_response_status() {
        let response = AppError::ValidationError("text is empty".into()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::from(serde_json::from_str::<u32>("x").unwrap_err()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
