//! Step sequencing and retry orchestration.
//!
//! This crate runs an ordered [`Sequence`] of [`Step`]s against an input,
//! one after another, retrying each step according to its own
//! [`RetryPolicy`]:
//! 1. Each step is executed by the [`StepExecutor`], which waits between
//!    attempts and stops early on fatal failures.
//! 2. The [`SequenceOrchestrator`] stores every success value in the
//!    [`AggregatedResult`] and decides whether a failure aborts the run
//!    (required step) or is absorbed (best-effort step).
//!
//! Runs are cancellable through a `CancellationToken` and can be bounded by
//! an overall deadline. Every attempt and run transition is reported to an
//! [`EventSink`].

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod result;
pub mod retry;
pub mod sink;
pub mod step;

pub use checkpoint::{Checkpointer, InMemoryCheckpointStore};
pub use config::OrchestratorConfig;
pub use error::{ActionError, FailureClass, OrchestratorError, RunFailure};
pub use events::{AttemptFailure, AttemptOutcome, RunEvent};
pub use executor::{Interruption, RunContext, StepExecutor, StepOutcome};
pub use orchestrator::SequenceOrchestrator;
pub use result::{AbsorbedFailure, AggregatedResult, RunStatus};
pub use retry::RetryPolicy;
pub use sink::{EventSink, InMemoryEventSink, TracingEventSink};
pub use step::{FnAction, Sequence, SequenceBuilder, Step, StepAction, StepValue, action_fn};

pub use tokio_util::sync::CancellationToken;
