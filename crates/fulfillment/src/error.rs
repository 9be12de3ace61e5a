//! Fulfillment error types.

use domain::OrderError;
use orchestrator::{ActionError, OrchestratorError};
use thiserror::Error;

/// Errors reported by the fulfillment services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached; trying again may succeed.
    #[error("{service} temporarily unavailable")]
    Unavailable { service: &'static str },

    /// The service refused the request; trying again will not help.
    #[error("{service} rejected the request: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },

    /// The order itself is malformed.
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),
}

impl ServiceError {
    pub fn unavailable(service: &'static str) -> Self {
        Self::Unavailable { service }
    }

    pub fn rejected(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            reason: reason.into(),
        }
    }

    /// Returns true if a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<ServiceError> for ActionError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidOrder(e) => ActionError::validation(e.to_string()),
            e @ ServiceError::Unavailable { .. } => ActionError::transient(e.to_string()),
            e @ ServiceError::Rejected { .. } => ActionError::fatal(e.to_string()),
        }
    }
}

/// Errors raised while assembling the fulfillment sequence.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The sequence or one of its steps is misconfigured.
    #[error("Invalid order sequence: {0}")]
    Configuration(#[from] OrchestratorError),
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
