//! Run events emitted for observability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ActionError, FailureClass};

/// Events emitted while a sequence runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RunEvent {
    /// A run started.
    RunStarted(RunStartedData),

    /// One attempt of a step finished.
    AttemptFinished(AttemptOutcome),

    /// A step succeeded and its value was committed.
    StepCompleted(StepCompletedData),

    /// A required step failed; the run aborts.
    StepFailed(StepFailedData),

    /// A best-effort step failed; the run continues.
    FailureAbsorbed(StepFailedData),

    /// Every step was processed.
    RunCompleted(RunFinishedData),

    /// A required step aborted the run.
    RunFailed(RunFailedData),

    /// The run was cancelled or hit its deadline.
    RunCancelled(RunFailedData),
}

impl RunEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            RunEvent::RunStarted(_) => "RunStarted",
            RunEvent::AttemptFinished(_) => "AttemptFinished",
            RunEvent::StepCompleted(_) => "StepCompleted",
            RunEvent::StepFailed(_) => "StepFailed",
            RunEvent::FailureAbsorbed(_) => "FailureAbsorbed",
            RunEvent::RunCompleted(_) => "RunCompleted",
            RunEvent::RunFailed(_) => "RunFailed",
            RunEvent::RunCancelled(_) => "RunCancelled",
        }
    }

    /// Returns the step this event concerns, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            RunEvent::AttemptFinished(outcome) => Some(&outcome.step),
            RunEvent::StepCompleted(data) => Some(&data.step),
            RunEvent::StepFailed(data) | RunEvent::FailureAbsorbed(data) => Some(&data.step),
            RunEvent::RunFailed(data) | RunEvent::RunCancelled(data) => Some(&data.step),
            RunEvent::RunStarted(_) | RunEvent::RunCompleted(_) => None,
        }
    }
}

/// Data for RunStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartedData {
    /// The sequence being run.
    pub sequence: String,
    /// The subject identifier (e.g. order ID).
    pub subject_id: String,
    /// Number of steps in the sequence.
    pub step_count: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

/// The outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    /// The step name.
    pub step: String,
    /// 1-indexed attempt number.
    pub attempt: u32,
    /// Attempt budget of the step.
    pub max_attempts: u32,
    /// Whether the attempt succeeded.
    pub succeeded: bool,
    /// The value produced on success.
    pub value: Option<Value>,
    /// The failure on failure.
    pub failure: Option<AttemptFailure>,
}

/// A classified attempt failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    /// Retryable or fatal.
    pub class: FailureClass,
    /// Error message.
    pub message: String,
}

impl AttemptOutcome {
    pub(crate) fn success(step: &str, attempt: u32, max_attempts: u32, value: Option<Value>) -> Self {
        Self {
            step: step.to_string(),
            attempt,
            max_attempts,
            succeeded: true,
            value,
            failure: None,
        }
    }

    pub(crate) fn failure(step: &str, attempt: u32, max_attempts: u32, error: &ActionError) -> Self {
        Self {
            step: step.to_string(),
            attempt,
            max_attempts,
            succeeded: false,
            value: None,
            failure: Some(AttemptFailure {
                class: error.class(),
                message: error.to_string(),
            }),
        }
    }

    /// Returns the outcome label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match &self.failure {
            None => "succeeded",
            Some(failure) => match failure.class {
                FailureClass::Retryable => "retryable",
                FailureClass::Fatal => "fatal",
            },
        }
    }
}

/// Data for StepCompleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCompletedData {
    /// The step name.
    pub step: String,
    /// Attempts it took.
    pub attempts: u32,
    /// Whether a value was written into the step's slot.
    pub produced_value: bool,
}

/// Data for StepFailed and FailureAbsorbed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    /// The step that failed.
    pub step: String,
    /// Attempts made.
    pub attempts: u32,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for RunCompleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFinishedData {
    /// Terminal status label.
    pub status: String,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Data for RunFailed and RunCancelled events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailedData {
    /// Terminal status label.
    pub status: String,
    /// The step the run stopped at.
    pub step: String,
    /// Reason for stopping.
    pub reason: String,
    /// When the run stopped.
    pub finished_at: DateTime<Utc>,
}

// Convenience constructors
impl RunEvent {
    /// Creates a RunStarted event.
    pub fn run_started(
        sequence: impl Into<String>,
        subject_id: impl Into<String>,
        step_count: usize,
    ) -> Self {
        RunEvent::RunStarted(RunStartedData {
            sequence: sequence.into(),
            subject_id: subject_id.into(),
            step_count,
            started_at: Utc::now(),
        })
    }

    /// Creates a StepCompleted event.
    pub fn step_completed(step: impl Into<String>, attempts: u32, produced_value: bool) -> Self {
        RunEvent::StepCompleted(StepCompletedData {
            step: step.into(),
            attempts,
            produced_value,
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step: impl Into<String>, attempts: u32, error: impl Into<String>) -> Self {
        RunEvent::StepFailed(StepFailedData {
            step: step.into(),
            attempts,
            error: error.into(),
        })
    }

    /// Creates a FailureAbsorbed event.
    pub fn failure_absorbed(
        step: impl Into<String>,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        RunEvent::FailureAbsorbed(StepFailedData {
            step: step.into(),
            attempts,
            error: error.into(),
        })
    }

    /// Creates a RunCompleted event.
    pub fn run_completed(status: impl Into<String>) -> Self {
        RunEvent::RunCompleted(RunFinishedData {
            status: status.into(),
            finished_at: Utc::now(),
        })
    }

    /// Creates a RunFailed event.
    pub fn run_failed(
        status: impl Into<String>,
        step: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RunEvent::RunFailed(RunFailedData {
            status: status.into(),
            step: step.into(),
            reason: reason.into(),
            finished_at: Utc::now(),
        })
    }

    /// Creates a RunCancelled event.
    pub fn run_cancelled(step: impl Into<String>, reason: impl Into<String>) -> Self {
        RunEvent::RunCancelled(RunFailedData {
            status: "cancelled".to_string(),
            step: step.into(),
            reason: reason.into(),
            finished_at: Utc::now(),
        })
    }
}
