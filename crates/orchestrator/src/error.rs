//! Orchestrator error types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::result::AggregatedResult;

/// Whether a failed attempt is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Another attempt may succeed.
    Retryable,
    /// Retrying cannot succeed; stop immediately.
    Fatal,
}

impl FailureClass {
    /// Returns the class name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Retryable => "retryable",
            FailureClass::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure returned by a single invocation of a step action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The input failed a required-field or business-rule check.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A dependent resource was temporarily unavailable.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The attempt did not finish within the step's per-attempt timeout.
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),

    /// Any other failure that retrying cannot fix.
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl ActionError {
    /// Creates a validation failure.
    pub fn validation(reason: impl Into<String>) -> Self {
        ActionError::Validation(reason.into())
    }

    /// Creates a transient failure.
    pub fn transient(reason: impl Into<String>) -> Self {
        ActionError::Transient(reason.into())
    }

    /// Creates a fatal failure.
    pub fn fatal(reason: impl Into<String>) -> Self {
        ActionError::Fatal(reason.into())
    }

    /// Classifies this failure for the retry loop.
    pub fn class(&self) -> FailureClass {
        match self {
            ActionError::Transient(_) | ActionError::TimedOut(_) => FailureClass::Retryable,
            ActionError::Validation(_) | ActionError::Fatal(_) => FailureClass::Fatal,
        }
    }

    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == FailureClass::Retryable
    }
}

/// Errors that can occur while defining or running a sequence.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A step, retry policy or sequence definition is invalid.
    #[error("Invalid configuration for '{subject}': {reason}")]
    Configuration { subject: String, reason: String },

    /// A step failed with a non-retryable failure.
    #[error("Step '{step}' failed: {source}")]
    StepFatal {
        step: String,
        #[source]
        source: ActionError,
    },

    /// A step kept failing with retryable failures until its attempts ran out.
    #[error("Step '{step}' exhausted {attempts} attempt(s): {source}")]
    StepExhausted {
        step: String,
        attempts: u32,
        #[source]
        source: ActionError,
    },

    /// The run's cancellation token fired.
    #[error("Run cancelled at step '{step}'")]
    Cancelled { step: String },

    /// The run's overall deadline passed.
    #[error("Run deadline of {deadline:?} exceeded at step '{step}'")]
    DeadlineExceeded { step: String, deadline: Duration },

    /// A checkpoint could not be written or read.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub(crate) fn configuration(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        OrchestratorError::Configuration {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Returns the step this error is attributed to, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            OrchestratorError::StepFatal { step, .. }
            | OrchestratorError::StepExhausted { step, .. }
            | OrchestratorError::Cancelled { step }
            | OrchestratorError::DeadlineExceeded { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Returns the action failure underneath a step error.
    pub fn action_error(&self) -> Option<&ActionError> {
        match self {
            OrchestratorError::StepFatal { source, .. }
            | OrchestratorError::StepExhausted { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true if the run was stopped by cancellation or its deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Cancelled { .. } | OrchestratorError::DeadlineExceeded { .. }
        )
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// A run that ended without completing, together with everything it
/// accumulated before it stopped.
#[derive(Debug, Error)]
#[error("Run {} for '{}' ended as {}: {error}", .result.run_id(), .result.id(), .result.status())]
pub struct RunFailure {
    /// The partially filled result; its status is terminal.
    pub result: AggregatedResult,
    /// Why the run stopped.
    #[source]
    pub error: OrchestratorError,
}

impl RunFailure {
    /// Returns the step that stopped the run.
    pub fn failed_step(&self) -> Option<&str> {
        self.error.step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            ActionError::transient("gateway down").class(),
            FailureClass::Retryable
        );
        assert_eq!(
            ActionError::TimedOut(Duration::from_secs(1)).class(),
            FailureClass::Retryable
        );
        assert_eq!(
            ActionError::validation("order ID is required").class(),
            FailureClass::Fatal
        );
        assert_eq!(ActionError::fatal("card stolen").class(), FailureClass::Fatal);
    }

    #[test]
    fn test_step_attribution() {
        let err = OrchestratorError::StepExhausted {
            step: "payment".to_string(),
            attempts: 5,
            source: ActionError::transient("gateway down"),
        };
        assert_eq!(err.step(), Some("payment"));
        assert_eq!(
            err.action_error(),
            Some(&ActionError::transient("gateway down"))
        );
        assert!(!err.is_cancellation());
        assert_eq!(
            err.to_string(),
            "Step 'payment' exhausted 5 attempt(s): transient failure: gateway down"
        );

        let cancelled = OrchestratorError::Cancelled {
            step: "shipping".to_string(),
        };
        assert!(cancelled.is_cancellation());
        assert!(cancelled.action_error().is_none());
    }

    #[test]
    fn test_configuration_has_no_step() {
        let err = OrchestratorError::configuration("payment", "max_attempts must be at least 1");
        assert!(err.step().is_none());
        assert!(err.to_string().contains("max_attempts"));
    }
}
