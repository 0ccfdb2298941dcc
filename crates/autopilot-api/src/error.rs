//! API error type and JSON error response formatting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use autopilot_core::error::AutopilotError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 422 Unprocessable Entity - collaborator output failed validation.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<AutopilotError> for ApiError {
    fn from(err: AutopilotError) -> Self {
        match &err {
            AutopilotError::Input(msg) => ApiError::BadRequest(msg.clone()),
            AutopilotError::NotFound(msg) => ApiError::NotFound(msg.clone()),
            AutopilotError::Schema(msg) => ApiError::UnprocessableEntity(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            ApiError::from(AutopilotError::Input("bad".to_string())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(AutopilotError::NotFound("run".to_string())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(AutopilotError::Schema("field".to_string())),
            ApiError::UnprocessableEntity(_)
        ));
        assert!(matches!(
            ApiError::from(AutopilotError::Storage("db".to_string())),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(AutopilotError::Collaborator("llm".to_string())),
            ApiError::Internal(_)
        ));
    }
}
