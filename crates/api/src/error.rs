//! HTTP error type
//!
//! Every handler returns `Result<_, ApiError>`. Errors render as
//! `{"error": <code>, "message": <text>}` with a status code per variant;
//! access denials also carry a `reason`.

use crate::guard::DenyReason;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tasktrack_db::DbError;
use thiserror::Error;
use tracing::error;

/// Errors returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Forbidden { reason: DenyReason, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    /// Detail is logged, never sent to the client
    #[error("internal error: {0}")]
    Internal(String),
}

/// Wire format of an error response
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(reason: DenyReason) -> Self {
        ApiError::Forbidden {
            reason,
            message: reason.message().to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidInput(message.into())
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub const fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::Conflict { message } => ApiError::Conflict(message),
            DbError::ValidationError { message } => ApiError::InvalidInput(message),
            other => ApiError::Internal(other.full_message()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, reason) = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "request failed");
                ("internal server error".to_string(), None)
            }
            ApiError::Forbidden { reason, message } => (message.clone(), Some(reason.as_str())),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
            reason,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::forbidden(DenyReason::NotMember).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::invalid("x").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_db_errors_map_to_http_errors() {
        let not_found: ApiError = DbError::not_found("Task", "abc").into();
        assert!(matches!(not_found, ApiError::NotFound(ref m) if m == "Task 'abc' not found"));

        let conflict: ApiError = DbError::conflict("taken").into();
        assert!(matches!(conflict, ApiError::Conflict(ref m) if m == "taken"));

        let invalid: ApiError = DbError::invalid("bad email").into();
        assert!(matches!(invalid, ApiError::InvalidInput(ref m) if m == "bad email"));
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal");
        assert_eq!(body["message"], "internal server error");
    }

    #[tokio::test]
    async fn test_forbidden_body_carries_reason() {
        let response = ApiError::forbidden(DenyReason::MissingPermission).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["reason"], "missing_permission");
    }
}
