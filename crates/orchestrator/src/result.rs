//! Per-run result accumulator and its status machine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::RunId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

const FAILED_SUFFIX: &str = "_failed";

/// The status of a sequence run.
///
/// State transitions:
/// ```text
/// Processing ──┬──► Completed
///              ├──► <step>_failed
///              └──► Cancelled
/// ```
///
/// Serialized as its label: `"processing"`, `"completed"`,
/// `"<step>_failed"` or `"cancelled"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RunStatus {
    /// Steps are still being executed.
    #[default]
    Processing,

    /// Every step was processed without an aborting failure (terminal state).
    Completed,

    /// A required step failed (terminal state).
    Failed { step: String },

    /// The run was cancelled or hit its deadline (terminal state).
    Cancelled,
}

impl RunStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Processing)
    }

    /// Returns true if the run completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    /// Returns the name of the step that aborted the run, if any.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            RunStatus::Failed { step } => Some(step),
            _ => None,
        }
    }

    /// Returns the status label.
    pub fn label(&self) -> String {
        match self {
            RunStatus::Processing => "processing".to_string(),
            RunStatus::Completed => "completed".to_string(),
            RunStatus::Failed { step } => format!("{step}{FAILED_SUFFIX}"),
            RunStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.label()
    }
}

impl TryFrom<String> for RunStatus {
    type Error = String;

    fn try_from(label: String) -> std::result::Result<Self, Self::Error> {
        match label.as_str() {
            "processing" => Ok(RunStatus::Processing),
            "completed" => Ok(RunStatus::Completed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => match other.strip_suffix(FAILED_SUFFIX) {
                Some(step) if !step.is_empty() => Ok(RunStatus::Failed {
                    step: step.to_string(),
                }),
                _ => Err(format!("unknown run status: {other}")),
            },
        }
    }
}

/// A best-effort step failure that was absorbed instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsorbedFailure {
    /// The step that failed.
    pub step: String,
    /// The step's last error.
    pub error: String,
}

/// Accumulator threaded through one sequence run.
///
/// Holds one named slot per step that produced a value, the steps
/// completed so far, and the terminal status once the run stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    id: String,
    run_id: RunId,
    sequence: String,
    status: RunStatus,
    slots: BTreeMap<String, Value>,
    completed_steps: Vec<String>,
    absorbed_failures: Vec<AbsorbedFailure>,
    failed_step: Option<String>,
    failure_reason: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl AggregatedResult {
    /// Creates an empty result in the `Processing` state.
    pub fn new(id: impl Into<String>, run_id: RunId, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            run_id,
            sequence: sequence.into(),
            status: RunStatus::Processing,
            slots: BTreeMap::new(),
            completed_steps: Vec::new(),
            absorbed_failures: Vec::new(),
            failed_step: None,
            failure_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record_success(&mut self, step: &str, value: Option<Value>) {
        if self.status.is_terminal() {
            return;
        }
        if let Some(value) = value {
            self.slots.insert(step.to_string(), value);
        }
        self.completed_steps.push(step.to_string());
    }

    pub(crate) fn absorb_failure(&mut self, step: &str, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.absorbed_failures.push(AbsorbedFailure {
            step: step.to_string(),
            error: error.into(),
        });
    }

    pub(crate) fn abort(&mut self, step: &str, reason: impl Into<String>) {
        self.finish(RunStatus::Failed {
            step: step.to_string(),
        });
        self.failed_step = Some(step.to_string());
        self.failure_reason = Some(reason.into());
    }

    pub(crate) fn cancel(&mut self, step: &str, reason: impl Into<String>) {
        self.finish(RunStatus::Cancelled);
        self.failed_step = Some(step.to_string());
        self.failure_reason = Some(reason.into());
    }

    pub(crate) fn complete(&mut self) {
        self.finish(RunStatus::Completed);
    }

    fn finish(&mut self, status: RunStatus) {
        debug_assert!(
            !self.status.is_terminal(),
            "run already finished as {}",
            self.status
        );
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

// Query methods
impl AggregatedResult {
    /// Returns the subject identifier (e.g. the order ID).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the run this result belongs to.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the name of the sequence that produced this result.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Returns the run status.
    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    /// Returns the raw value stored by a step, if it produced one.
    pub fn slot(&self, step: &str) -> Option<&Value> {
        self.slots.get(step)
    }

    /// Deserializes the value stored by a step.
    pub fn slot_as<T: DeserializeOwned>(&self, step: &str) -> Result<Option<T>> {
        self.slots
            .get(step)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(OrchestratorError::from)
    }

    /// Returns all filled slots keyed by step name.
    pub fn slots(&self) -> &BTreeMap<String, Value> {
        &self.slots
    }

    /// Returns the names of the steps that succeeded, in execution order.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns the best-effort failures absorbed during the run.
    pub fn absorbed_failures(&self) -> &[AbsorbedFailure] {
        &self.absorbed_failures
    }

    /// Returns the step that stopped the run, if it did not complete.
    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    /// Returns the reason the run stopped, if it did not complete.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns when the run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the run reached its terminal status.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}
