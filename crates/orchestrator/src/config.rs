//! Engine configuration.

use std::time::Duration;

/// Settings shared by every run of a [`crate::SequenceOrchestrator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Overall budget for a single run, measured from its start.
    pub run_deadline: Option<Duration>,
}

impl OrchestratorConfig {
    /// Creates a configuration without a run deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds every run to `deadline`.
    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = Some(deadline);
        self
    }
}
