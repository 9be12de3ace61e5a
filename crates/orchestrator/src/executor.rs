//! Runs a single step to success, fatal failure or exhaustion.

use std::sync::Arc;
use std::time::Duration;

use common::RunId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ActionError, FailureClass, OrchestratorError};
use crate::events::{AttemptOutcome, RunEvent};
use crate::result::AggregatedResult;
use crate::sink::EventSink;
use crate::step::{Step, StepValue};

/// Why a run stopped before a step could finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The cancellation token fired.
    Cancelled,
    /// The run deadline passed.
    DeadlineExceeded(Duration),
}

impl Interruption {
    /// Converts the interruption into the error reported for the run.
    pub fn into_error(self, step: &str) -> OrchestratorError {
        match self {
            Interruption::Cancelled => OrchestratorError::Cancelled {
                step: step.to_string(),
            },
            Interruption::DeadlineExceeded(deadline) => OrchestratorError::DeadlineExceeded {
                step: step.to_string(),
                deadline,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

/// Per-run execution context: identity, cancellation and deadline.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: RunId,
    cancel: CancellationToken,
    deadline: Option<Deadline>,
}

impl RunContext {
    /// Creates a context without a deadline.
    pub fn new(run_id: RunId, cancel: CancellationToken) -> Self {
        Self {
            run_id,
            cancel,
            deadline: None,
        }
    }

    /// Bounds the run to `budget`, starting now.
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        // A budget too large to represent never fires.
        self.deadline = Instant::now()
            .checked_add(budget)
            .map(|at| Deadline { at, budget });
        self
    }

    /// Returns the run ID.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the cancellation token observed by this run.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the interruption that is already in effect, if any.
    pub fn interruption(&self) -> Option<Interruption> {
        if self.cancel.is_cancelled() {
            return Some(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline.at => {
                Some(Interruption::DeadlineExceeded(deadline.budget))
            }
            _ => None,
        }
    }

    /// Sleeps for `delay` unless the run is cancelled or its deadline passes first.
    pub async fn wait(&self, delay: Duration) -> Result<(), Interruption> {
        let deadline = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline.at).await;
                    deadline.budget
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interruption::Cancelled),
            budget = deadline => Err(Interruption::DeadlineExceeded(budget)),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// An attempt succeeded.
    Succeeded { value: StepValue, attempts: u32 },
    /// An attempt failed with a non-retryable failure.
    FailedFatal { error: ActionError, attempts: u32 },
    /// Every attempt failed with a retryable failure.
    FailedExhausted { error: ActionError, attempts: u32 },
    /// The run was cancelled or hit its deadline before the step finished.
    Interrupted {
        interruption: Interruption,
        attempts: u32,
    },
}

impl StepOutcome {
    /// Returns the number of attempts actually dispatched.
    pub fn attempts(&self) -> u32 {
        match self {
            StepOutcome::Succeeded { attempts, .. }
            | StepOutcome::FailedFatal { attempts, .. }
            | StepOutcome::FailedExhausted { attempts, .. }
            | StepOutcome::Interrupted { attempts, .. } => *attempts,
        }
    }

    /// Returns true if the step succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

/// Invokes a step's action repeatedly according to its retry policy.
#[derive(Clone)]
pub struct StepExecutor {
    sink: Arc<dyn EventSink>,
}

impl StepExecutor {
    /// Creates an executor reporting attempts to `sink`.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Runs `step` until it succeeds, fails fatally, exhausts its attempts
    /// or the run is interrupted.
    ///
    /// Cancellation is observed before each attempt is dispatched and while
    /// waiting between attempts; an attempt in flight always finishes.
    #[tracing::instrument(skip_all, fields(run_id = %ctx.run_id(), step = step.name()))]
    pub async fn execute<I: Send + Sync>(
        &self,
        step: &Step<I>,
        input: &I,
        progress: &AggregatedResult,
        ctx: &RunContext,
    ) -> StepOutcome {
        let policy = step.policy();
        let max_attempts = policy.max_attempts();
        let mut attempt = 1;

        loop {
            if attempt > 1 {
                let delay = policy.delay_before_attempt(attempt);
                tracing::debug!(attempt, ?delay, "backing off before next attempt");
                if let Err(interruption) = ctx.wait(delay).await {
                    return StepOutcome::Interrupted {
                        interruption,
                        attempts: attempt - 1,
                    };
                }
            }

            if let Some(interruption) = ctx.interruption() {
                return StepOutcome::Interrupted {
                    interruption,
                    attempts: attempt - 1,
                };
            }

            match self.attempt(step, input, progress).await {
                Ok(value) => {
                    self.report(
                        ctx,
                        AttemptOutcome::success(step.name(), attempt, max_attempts, value.clone()),
                    );
                    return StepOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    self.report(
                        ctx,
                        AttemptOutcome::failure(step.name(), attempt, max_attempts, &error),
                    );
                    if error.class() == FailureClass::Fatal {
                        return StepOutcome::FailedFatal {
                            error,
                            attempts: attempt,
                        };
                    }
                    if attempt >= max_attempts {
                        return StepOutcome::FailedExhausted {
                            error,
                            attempts: attempt,
                        };
                    }
                }
            }

            attempt += 1;
        }
    }

    async fn attempt<I: Send + Sync>(
        &self,
        step: &Step<I>,
        input: &I,
        progress: &AggregatedResult,
    ) -> Result<StepValue, ActionError> {
        let invocation = step.action().invoke(input, progress);
        match step.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, invocation)
                .await
                .unwrap_or(Err(ActionError::TimedOut(timeout))),
            None => invocation.await,
        }
    }

    fn report(&self, ctx: &RunContext, outcome: AttemptOutcome) {
        metrics::counter!(
            "step_attempts_total",
            "step" => outcome.step.clone(),
            "outcome" => outcome.label()
        )
        .increment(1);
        self.sink
            .record(ctx.run_id(), &RunEvent::AttemptFinished(outcome));
    }
}
