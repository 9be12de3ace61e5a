//! Event sinks that consume run events.

use std::sync::{Arc, PoisonError, RwLock};

use common::RunId;

use crate::events::RunEvent;

/// Consumer of run events.
///
/// Sinks are called inline from the run, so they should return quickly.
pub trait EventSink: Send + Sync {
    /// Records one event of the given run.
    fn record(&self, run_id: RunId, event: &RunEvent);
}

/// Writes every run event as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, run_id: RunId, event: &RunEvent) {
        match event {
            RunEvent::RunStarted(data) => tracing::info!(
                %run_id,
                sequence = %data.sequence,
                subject_id = %data.subject_id,
                step_count = data.step_count,
                "sequence run started"
            ),
            RunEvent::AttemptFinished(outcome) => match &outcome.failure {
                None => tracing::debug!(
                    %run_id,
                    step = %outcome.step,
                    attempt = outcome.attempt,
                    max_attempts = outcome.max_attempts,
                    outcome = outcome.label(),
                    "step attempt finished"
                ),
                Some(failure) => tracing::warn!(
                    %run_id,
                    step = %outcome.step,
                    attempt = outcome.attempt,
                    max_attempts = outcome.max_attempts,
                    outcome = outcome.label(),
                    error = %failure.message,
                    "step attempt failed"
                ),
            },
            RunEvent::StepCompleted(data) => tracing::info!(
                %run_id,
                step = %data.step,
                attempts = data.attempts,
                "step completed"
            ),
            RunEvent::StepFailed(data) => tracing::warn!(
                %run_id,
                step = %data.step,
                attempts = data.attempts,
                error = %data.error,
                "required step failed"
            ),
            RunEvent::FailureAbsorbed(data) => tracing::warn!(
                %run_id,
                step = %data.step,
                attempts = data.attempts,
                error = %data.error,
                "best-effort step failed, continuing anyway"
            ),
            RunEvent::RunCompleted(data) => tracing::info!(
                %run_id,
                status = %data.status,
                "sequence run completed"
            ),
            RunEvent::RunFailed(data) => tracing::warn!(
                %run_id,
                status = %data.status,
                step = %data.step,
                reason = %data.reason,
                "sequence run failed"
            ),
            RunEvent::RunCancelled(data) => tracing::warn!(
                %run_id,
                step = %data.step,
                reason = %data.reason,
                "sequence run cancelled"
            ),
        }
    }
}

/// Keeps every event in memory, for tests and inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<RwLock<Vec<(RunId, RunEvent)>>>,
}

impl InMemoryEventSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events in order.
    pub fn events(&self) -> Vec<(RunId, RunEvent)> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the events recorded for one run.
    pub fn events_for(&self, run_id: RunId) -> Vec<RunEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Returns the event type names in recording order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, event)| event.event_type())
            .collect()
    }

    /// Counts the attempts recorded for a step across all runs.
    pub fn attempts_for(&self, step: &str) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, event)| {
                matches!(event, RunEvent::AttemptFinished(outcome) if outcome.step == step)
            })
            .count()
    }

    /// Removes every recorded event.
    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, run_id: RunId, event: &RunEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((run_id, event.clone()));
    }
}
