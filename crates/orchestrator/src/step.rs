//! Steps, step actions and sequences.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ActionError, OrchestratorError, Result};
use crate::result::AggregatedResult;
use crate::retry::RetryPolicy;

/// What a successful attempt hands back: a value for the step's slot, or
/// nothing for steps that only check or notify.
pub type StepValue = Option<Value>;

/// The unit of work behind a step.
///
/// The action receives the run input and the result accumulated by the
/// steps before it. It may be invoked several times for one step run.
#[async_trait]
pub trait StepAction<I>: Send + Sync {
    /// Performs one attempt.
    async fn invoke(
        &self,
        input: &I,
        progress: &AggregatedResult,
    ) -> std::result::Result<StepValue, ActionError>;
}

/// A [`StepAction`] backed by a closure over owned copies of its arguments.
pub struct FnAction<F>(F);

/// Wraps a closure as a step action.
///
/// The closure gets a clone of the input and of the accumulated result, so
/// the returned future can be `'static`.
pub fn action_fn<I, F, Fut>(f: F) -> FnAction<F>
where
    F: Fn(I, AggregatedResult) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<StepValue, ActionError>> + Send + 'static,
{
    FnAction(f)
}

#[async_trait]
impl<I, F, Fut> StepAction<I> for FnAction<F>
where
    I: Clone + Send + Sync + 'static,
    F: Fn(I, AggregatedResult) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<StepValue, ActionError>> + Send + 'static,
{
    async fn invoke(
        &self,
        input: &I,
        progress: &AggregatedResult,
    ) -> std::result::Result<StepValue, ActionError> {
        (self.0)(input.clone(), progress.clone()).await
    }
}

/// A named unit of work with its own retry policy and requiredness.
pub struct Step<I> {
    name: String,
    action: Arc<dyn StepAction<I>>,
    policy: RetryPolicy,
    required: bool,
    timeout: Option<Duration>,
}

impl<I: Send + Sync> Step<I> {
    /// Creates a step, rejecting malformed names and retry policies.
    pub fn new(
        name: impl Into<String>,
        action: Arc<dyn StepAction<I>>,
        policy: RetryPolicy,
        required: bool,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OrchestratorError::configuration(
                "<unnamed step>",
                "step name must not be empty",
            ));
        }
        policy.validate(&name)?;

        Ok(Self {
            name,
            action,
            policy,
            required,
            timeout: None,
        })
    }

    /// Creates a step whose failure aborts the run.
    pub fn required(
        name: impl Into<String>,
        action: impl StepAction<I> + 'static,
        policy: RetryPolicy,
    ) -> Result<Self> {
        Self::new(name, Arc::new(action), policy, true)
    }

    /// Creates a step whose failure is absorbed.
    pub fn best_effort(
        name: impl Into<String>,
        action: impl StepAction<I> + 'static,
        policy: RetryPolicy,
    ) -> Result<Self> {
        Self::new(name, Arc::new(action), policy, false)
    }

    /// Bounds each attempt of this step to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(OrchestratorError::configuration(
                &self.name,
                "timeout must be greater than zero",
            ));
        }
        self.timeout = Some(timeout);
        Ok(self)
    }
}

impl<I> Step<I> {
    /// Returns the step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns true if a failure of this step aborts the run.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the per-attempt timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn action(&self) -> &dyn StepAction<I> {
        self.action.as_ref()
    }
}

impl<I> Clone for Step<I> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            action: Arc::clone(&self.action),
            policy: self.policy.clone(),
            required: self.required,
            timeout: self.timeout,
        }
    }
}

impl<I> std::fmt::Debug for Step<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("required", &self.required)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// An ordered, non-empty list of uniquely named steps.
#[derive(Debug, Clone)]
pub struct Sequence<I> {
    name: String,
    steps: Vec<Step<I>>,
}

impl<I> Sequence<I> {
    /// Creates a sequence, rejecting empty step lists and duplicate names.
    pub fn new(name: impl Into<String>, steps: Vec<Step<I>>) -> Result<Self> {
        let name = name.into();
        if steps.is_empty() {
            return Err(OrchestratorError::configuration(
                &name,
                "a sequence needs at least one step",
            ));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.name()) {
                return Err(OrchestratorError::configuration(
                    &name,
                    format!("duplicate step name '{}'", step.name()),
                ));
            }
        }

        Ok(Self { name, steps })
    }

    /// Starts building a sequence.
    pub fn builder(name: impl Into<String>) -> SequenceBuilder<I> {
        SequenceBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Returns the sequence name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the steps in execution order.
    pub fn steps(&self) -> &[Step<I>] {
        &self.steps
    }

    /// Looks up a step by name.
    pub fn step(&self, name: &str) -> Option<&Step<I>> {
        self.steps.iter().find(|step| step.name() == name)
    }
}

/// Builder for [`Sequence`].
pub struct SequenceBuilder<I> {
    name: String,
    steps: Vec<Step<I>>,
}

impl<I> SequenceBuilder<I> {
    /// Appends a step.
    pub fn step(mut self, step: Step<I>) -> Self {
        self.steps.push(step);
        self
    }

    /// Validates and builds the sequence.
    pub fn build(self) -> Result<Sequence<I>> {
        Sequence::new(self.name, self.steps)
    }
}
