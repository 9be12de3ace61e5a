//! Checkpoint collaborator called after every step commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::RunId;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::result::AggregatedResult;

/// Stores snapshots of a run's accumulated result.
///
/// The orchestrator calls [`Checkpointer::checkpoint`] after each step is
/// committed and once more when the run reaches its terminal status.
/// Resuming execution from a checkpoint is left to the caller.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persists the current state of a run.
    async fn checkpoint(&self, result: &AggregatedResult) -> Result<()>;

    /// Loads the latest checkpoint of a run.
    async fn resume(&self, run_id: RunId) -> Result<Option<AggregatedResult>>;
}

#[derive(Debug, Default)]
struct CheckpointState {
    runs: HashMap<RunId, AggregatedResult>,
    latest_by_subject: HashMap<String, RunId>,
    writes: usize,
}

/// In-memory checkpoint store.
///
/// Only the newest run of each subject is kept: once a new run of the same
/// subject checkpoints, the older run's snapshot is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    state: Arc<RwLock<CheckpointState>>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest checkpoint of the most recent run for a subject.
    pub async fn latest_for_subject(&self, subject_id: &str) -> Option<AggregatedResult> {
        let state = self.state.read().await;
        state
            .latest_by_subject
            .get(subject_id)
            .and_then(|run_id| state.runs.get(run_id))
            .cloned()
    }

    /// Returns the number of checkpoints written so far.
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }

    /// Returns the number of runs currently held.
    pub async fn run_count(&self) -> usize {
        self.state.read().await.runs.len()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointStore {
    async fn checkpoint(&self, result: &AggregatedResult) -> Result<()> {
        let mut state = self.state.write().await;
        let replaced = state
            .latest_by_subject
            .insert(result.id().to_string(), result.run_id());
        if let Some(previous) = replaced
            && previous != result.run_id()
        {
            state.runs.remove(&previous);
        }
        state.runs.insert(result.run_id(), result.clone());
        state.writes += 1;
        Ok(())
    }

    async fn resume(&self, run_id: RunId) -> Result<Option<AggregatedResult>> {
        Ok(self.state.read().await.runs.get(&run_id).cloned())
    }
}
