//! Sequence orchestrator for running steps in order.

use std::sync::Arc;

use common::RunId;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::Checkpointer;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, RunFailure};
use crate::events::RunEvent;
use crate::executor::{RunContext, StepExecutor, StepOutcome};
use crate::result::AggregatedResult;
use crate::sink::{EventSink, TracingEventSink};
use crate::step::{Sequence, Step};

/// Runs a [`Sequence`] step by step, aggregating results.
///
/// Required-step failures abort the run with status `<step>_failed`;
/// best-effort failures are recorded and the run carries on. The
/// orchestrator keeps no state between runs, so one instance can drive
/// many concurrent runs.
#[derive(Clone)]
pub struct SequenceOrchestrator {
    config: OrchestratorConfig,
    executor: StepExecutor,
    sink: Arc<dyn EventSink>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl SequenceOrchestrator {
    /// Creates an orchestrator that logs run events through `tracing`.
    pub fn new(config: OrchestratorConfig) -> Self {
        let sink: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        Self {
            config,
            executor: StepExecutor::new(Arc::clone(&sink)),
            sink,
            checkpointer: None,
        }
    }

    /// Sends run events to `sink` instead.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.executor = StepExecutor::new(Arc::clone(&sink));
        self.sink = sink;
        self
    }

    /// Checkpoints the result after every step commit.
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Runs every step of `sequence` against `input`.
    ///
    /// Returns the completed result, or a [`RunFailure`] holding the
    /// partially filled result and the error that stopped the run.
    pub async fn run<I: Send + Sync>(
        &self,
        sequence: &Sequence<I>,
        input: &I,
        subject_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<AggregatedResult, RunFailure> {
        self.run_with_id(sequence, input, subject_id.into(), RunId::new(), cancel)
            .await
    }

    #[tracing::instrument(skip(self, sequence, input, cancel), fields(sequence = sequence.name()))]
    async fn run_with_id<I: Send + Sync>(
        &self,
        sequence: &Sequence<I>,
        input: &I,
        subject_id: String,
        run_id: RunId,
        cancel: CancellationToken,
    ) -> Result<AggregatedResult, RunFailure> {
        metrics::counter!("sequence_runs_total").increment(1);
        let run_start = std::time::Instant::now();

        let mut ctx = RunContext::new(run_id, cancel);
        if let Some(deadline) = self.config.run_deadline {
            ctx = ctx.with_deadline(deadline);
        }

        let mut result = AggregatedResult::new(subject_id.as_str(), run_id, sequence.name());
        self.emit(
            run_id,
            RunEvent::run_started(sequence.name(), subject_id, sequence.steps().len()),
        );

        for step in sequence.steps() {
            let outcome = self.executor.execute(step, input, &result, &ctx).await;
            let attempts = outcome.attempts();

            let abort = match outcome {
                StepOutcome::Succeeded { value, .. } => {
                    let produced_value = value.is_some();
                    result.record_success(step.name(), value);
                    self.emit(
                        run_id,
                        RunEvent::step_completed(step.name(), attempts, produced_value),
                    );
                    None
                }
                StepOutcome::FailedFatal { error, .. } => {
                    let error = OrchestratorError::StepFatal {
                        step: step.name().to_string(),
                        source: error,
                    };
                    self.handle_failure(step, attempts, error, &mut result)
                }
                StepOutcome::FailedExhausted { error, .. } => {
                    let error = OrchestratorError::StepExhausted {
                        step: step.name().to_string(),
                        attempts,
                        source: error,
                    };
                    self.handle_failure(step, attempts, error, &mut result)
                }
                StepOutcome::Interrupted { interruption, .. } => {
                    let error = interruption.into_error(step.name());
                    result.cancel(step.name(), error.to_string());
                    self.emit(
                        run_id,
                        RunEvent::run_cancelled(step.name(), error.to_string()),
                    );
                    metrics::counter!("sequence_runs_cancelled").increment(1);
                    Some(error)
                }
            };

            self.checkpoint(&result).await;

            if let Some(error) = abort {
                metrics::histogram!("sequence_run_duration_seconds")
                    .record(run_start.elapsed().as_secs_f64());
                tracing::warn!(%run_id, status = %result.status(), error = %error, "sequence run stopped");
                return Err(RunFailure { result, error });
            }
        }

        result.complete();
        self.emit(run_id, RunEvent::run_completed(result.status().label()));
        self.checkpoint(&result).await;

        let duration = run_start.elapsed().as_secs_f64();
        metrics::histogram!("sequence_run_duration_seconds").record(duration);
        metrics::counter!("sequence_runs_completed").increment(1);
        tracing::info!(%run_id, duration, "sequence run finished");

        Ok(result)
    }

    /// Applies a step failure to the result. Returns the error when the
    /// step is required and the run must stop.
    fn handle_failure<I>(
        &self,
        step: &Step<I>,
        attempts: u32,
        error: OrchestratorError,
        result: &mut AggregatedResult,
    ) -> Option<OrchestratorError> {
        let run_id = result.run_id();
        let message = error.to_string();

        if step.is_required() {
            result.abort(step.name(), message.clone());
            self.emit(
                run_id,
                RunEvent::step_failed(step.name(), attempts, message.clone()),
            );
            self.emit(
                run_id,
                RunEvent::run_failed(result.status().label(), step.name(), message),
            );
            metrics::counter!("sequence_runs_failed").increment(1);
            return Some(error);
        }

        metrics::counter!("step_failures_absorbed_total", "step" => step.name().to_string())
            .increment(1);
        result.absorb_failure(step.name(), message.clone());
        self.emit(
            run_id,
            RunEvent::failure_absorbed(step.name(), attempts, message),
        );
        None
    }

    fn emit(&self, run_id: RunId, event: RunEvent) {
        self.sink.record(run_id, &event);
    }

    /// Hands the result to the checkpointer; a failed write is logged, not fatal.
    async fn checkpoint(&self, result: &AggregatedResult) {
        if let Some(checkpointer) = &self.checkpointer
            && let Err(e) = checkpointer.checkpoint(result).await
        {
            tracing::warn!(run_id = %result.run_id(), error = %e, "checkpoint failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::error::ActionError;
    use crate::result::RunStatus;
    use crate::retry::RetryPolicy;
    use crate::sink::InMemoryEventSink;
    use crate::step::{StepAction, action_fn};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(100), 2.0, max_attempts)
    }

    fn succeeding(calls: Arc<AtomicU32>, value: serde_json::Value) -> impl StepAction<String> {
        action_fn(move |_: String, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            async move { Ok(Some(value)) }
        })
    }

    fn failing(calls: Arc<AtomicU32>, error: ActionError) -> impl StepAction<String> {
        action_fn(move |_: String, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            let error = error.clone();
            async move { Err(error) }
        })
    }

    fn setup() -> (SequenceOrchestrator, InMemoryEventSink, InMemoryCheckpointStore) {
        let sink = InMemoryEventSink::new();
        let store = InMemoryCheckpointStore::new();
        let orchestrator = SequenceOrchestrator::new(OrchestratorConfig::default())
            .with_event_sink(Arc::new(sink.clone()))
            .with_checkpointer(Arc::new(store.clone()));
        (orchestrator, sink, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_steps_succeed() {
        let (orchestrator, sink, store) = setup();
        let a_calls = Arc::new(AtomicU32::new(0));
        let b_calls = Arc::new(AtomicU32::new(0));
        let sequence = Sequence::builder("seq")
            .step(Step::required("A", succeeding(a_calls.clone(), json!(1)), policy(3)).unwrap())
            .step(Step::required("B", succeeding(b_calls.clone(), json!(2)), policy(3)).unwrap())
            .build()
            .unwrap();

        let result = orchestrator
            .run(&sequence, &"input".to_string(), "order-001", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status(), &RunStatus::Completed);
        assert_eq!(result.id(), "order-001");
        assert_eq!(result.slot("A"), Some(&json!(1)));
        assert_eq!(result.slot("B"), Some(&json!(2)));
        assert_eq!(result.completed_steps(), &["A", "B"]);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);

        assert_eq!(
            sink.event_types(),
            [
                "RunStarted",
                "AttemptFinished",
                "StepCompleted",
                "AttemptFinished",
                "StepCompleted",
                "RunCompleted"
            ]
        );
        // One checkpoint per step plus the terminal one.
        assert_eq!(store.write_count().await, 3);
        let checkpoint = store.resume(result.run_id()).await.unwrap().unwrap();
        assert_eq!(checkpoint.status(), &RunStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_required_failure_aborts() {
        let (orchestrator, sink, store) = setup();
        let a_calls = Arc::new(AtomicU32::new(0));
        let b_calls = Arc::new(AtomicU32::new(0));
        let sequence = Sequence::builder("seq")
            .step(
                Step::required(
                    "A",
                    failing(a_calls.clone(), ActionError::transient("down")),
                    policy(2),
                )
                .unwrap(),
            )
            .step(Step::required("B", succeeding(b_calls.clone(), json!(2)), policy(3)).unwrap())
            .build()
            .unwrap();

        let failure = orchestrator
            .run(&sequence, &"input".to_string(), "order-001", CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.result.status().to_string(), "A_failed");
        assert_eq!(failure.failed_step(), Some("A"));
        assert!(matches!(
            failure.error,
            OrchestratorError::StepExhausted { attempts: 2, .. }
        ));
        assert_eq!(failure.result.failed_step(), Some("A"));
        assert!(failure.result.failure_reason().unwrap().contains("down"));
        assert_eq!(a_calls.load(Ordering::SeqCst), 2);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);

        let types = sink.event_types();
        assert_eq!(types.last(), Some(&"RunFailed"));
        assert!(types.contains(&"StepFailed"));

        let checkpoint = store.resume(failure.result.run_id()).await.unwrap().unwrap();
        assert_eq!(checkpoint.status().to_string(), "A_failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_result_kept_on_abort() {
        let (orchestrator, _sink, _store) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let sequence = Sequence::builder("seq")
            .step(Step::required("A", succeeding(calls.clone(), json!("a")), policy(1)).unwrap())
            .step(
                Step::required(
                    "B",
                    failing(calls.clone(), ActionError::fatal("broken")),
                    policy(5),
                )
                .unwrap(),
            )
            .build()
            .unwrap();

        let failure = orchestrator
            .run(&sequence, &String::new(), "order-002", CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.result.status().to_string(), "B_failed");
        assert_eq!(failure.result.slot("A"), Some(&json!("a")));
        assert!(matches!(failure.error, OrchestratorError::StepFatal { .. }));
        // One call for A, one for B: fatal failures are not retried.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_effort_failure_is_absorbed() {
        let (orchestrator, sink, _store) = setup();
        let a_calls = Arc::new(AtomicU32::new(0));
        let b_calls = Arc::new(AtomicU32::new(0));
        let sequence = Sequence::builder("seq")
            .step(Step::required("A", succeeding(a_calls.clone(), json!(1)), policy(3)).unwrap())
            .step(
                Step::best_effort(
                    "B",
                    failing(b_calls.clone(), ActionError::transient("smtp down")),
                    policy(2),
                )
                .unwrap(),
            )
            .build()
            .unwrap();

        let result = orchestrator
            .run(&sequence, &String::new(), "order-003", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status().to_string(), "completed");
        // The best-effort step still uses its own retry policy.
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);
        assert!(result.slot("B").is_none());
        assert_eq!(result.completed_steps(), &["A"]);
        assert_eq!(result.absorbed_failures().len(), 1);
        assert_eq!(result.absorbed_failures()[0].step, "B");
        assert!(sink.event_types().contains(&"FailureAbsorbed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_steps_see_earlier_values() {
        let (orchestrator, _sink, _store) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let reader = action_fn(|_: String, progress: AggregatedResult| {
            let outcome = match progress.slot("A") {
                Some(upstream) => Ok(Some(json!({ "from_a": upstream }))),
                None => Err(ActionError::fatal("A missing")),
            };
            std::future::ready(outcome)
        });
        let sequence = Sequence::builder("seq")
            .step(Step::required("A", succeeding(calls, json!(42)), policy(1)).unwrap())
            .step(Step::required("B", reader, policy(1)).unwrap())
            .build()
            .unwrap();

        let result = orchestrator
            .run(&sequence, &String::new(), "order-004", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.slot("B"), Some(&json!({"from_a": 42})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_invokes_no_further_steps() {
        let (orchestrator, sink, _store) = setup();
        let token = CancellationToken::new();
        let b_calls = Arc::new(AtomicU32::new(0));

        let cancel_from_a = token.clone();
        let a = action_fn(move |_: String, _| {
            // Cancellation arrives while A is in flight; A still finishes.
            cancel_from_a.cancel();
            async { Ok(Some(json!("a"))) }
        });
        let sequence = Sequence::builder("seq")
            .step(Step::required("A", a, policy(1)).unwrap())
            .step(Step::required("B", succeeding(b_calls.clone(), json!(2)), policy(3)).unwrap())
            .build()
            .unwrap();

        let failure = orchestrator
            .run(&sequence, &String::new(), "order-005", token)
            .await
            .unwrap_err();

        assert_eq!(failure.result.status(), &RunStatus::Cancelled);
        assert_eq!(failure.result.slot("A"), Some(&json!("a")));
        assert!(matches!(
            failure.error,
            OrchestratorError::Cancelled { ref step } if step == "B"
        ));
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.event_types().last(), Some(&"RunCancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline() {
        let sink = InMemoryEventSink::new();
        let orchestrator = SequenceOrchestrator::new(
            OrchestratorConfig::new().with_run_deadline(Duration::from_secs(2)),
        )
        .with_event_sink(Arc::new(sink.clone()));

        let calls = Arc::new(AtomicU32::new(0));
        let sequence = Sequence::builder("seq")
            .step(
                Step::required(
                    "A",
                    failing(calls.clone(), ActionError::transient("down")),
                    RetryPolicy::new(Duration::from_secs(1), 2.0, 10),
                )
                .unwrap(),
            )
            .build()
            .unwrap();

        let failure = orchestrator
            .run(&sequence, &String::new(), "order-006", CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.result.status(), &RunStatus::Cancelled);
        assert!(matches!(
            failure.error,
            OrchestratorError::DeadlineExceeded { .. }
        ));
        // Attempts at t=0 and t=1; the wait for t=3 crosses the deadline.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let (orchestrator, _sink, store) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let echo = action_fn(|input: String, _| async move { Ok(Some(json!(input))) });
        let sequence = Arc::new(
            Sequence::builder("seq")
                .step(Step::required("echo", echo, policy(1)).unwrap())
                .step(Step::required("count", succeeding(calls.clone(), json!(0)), policy(1)).unwrap())
                .build()
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..8 {
            let orchestrator = orchestrator.clone();
            let sequence = Arc::clone(&sequence);
            handles.push(tokio::spawn(async move {
                let input = format!("order-{i}");
                orchestrator
                    .run(&sequence, &input, input.clone(), CancellationToken::new())
                    .await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.slot("echo"), Some(&json!(format!("order-{i}"))));
            assert_eq!(result.id(), format!("order-{i}"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(store.run_count().await, 8);
    }
}
