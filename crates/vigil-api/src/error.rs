//! Error types for the API server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use vigil_engine::EngineError;
use vigil_policy::PolicyError;
use vigil_store::StoreError;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur while serving the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// Missing or malformed authentication headers.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Invalid request parameters or body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Engine(err) => match err {
                EngineError::Validation { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
                EngineError::RuleReferenced(_) => (StatusCode::CONFLICT, "rule_referenced"),
                EngineError::Policy(policy) => match policy {
                    PolicyError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
                    PolicyError::NotClaimHolder { .. } => (StatusCode::FORBIDDEN, "not_claim_holder"),
                },
                EngineError::Store(store) => match store {
                    StoreError::AlertNotFound(_) | StoreError::RuleNotFound(_) => {
                        (StatusCode::NOT_FOUND, "not_found")
                    }
                    // Cross-tenant access reads as forbidden, never as a
                    // hint that the resource exists.
                    StoreError::OrganizationAccessDenied { .. } => {
                        (StatusCode::FORBIDDEN, "forbidden")
                    }
                    StoreError::AlreadyClaimed { .. } => (StatusCode::CONFLICT, "already_claimed"),
                    StoreError::NotHolder { .. } => (StatusCode::CONFLICT, "not_holder"),
                    StoreError::InvalidTransition { .. } => {
                        (StatusCode::CONFLICT, "invalid_transition")
                    }
                    StoreError::DuplicateOpenAlert { .. } => {
                        (StatusCode::CONFLICT, "duplicate_open_alert")
                    }
                    StoreError::DuplicateRule(_) => (StatusCode::CONFLICT, "duplicate_rule"),
                },
            },
            Self::BindFailed(_, _) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}
