//! Worker error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;
use thiserror::Error;

/// Errors that stop the worker from starting or serving.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// An environment variable holds an unusable value.
    #[error("Invalid environment variable {var}: {reason}")]
    InvalidConfig { var: &'static str, reason: String },

    /// The order sequence could not be built.
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub(crate) fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            var,
            reason: reason.into(),
        }
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// The worker is shutting down and takes no new orders.
    Unavailable(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
