//! Retry and timeout settings for the order sequence.

use std::time::Duration;

use orchestrator::RetryPolicy;

/// Attempts and per-attempt timeout for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSettings {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl StepSettings {
    pub const fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts,
            timeout,
        }
    }
}

/// Configuration of the four fulfillment steps.
///
/// All steps share the same backoff curve and differ in attempts and
/// timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSequenceConfig {
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub maximum_delay: Option<Duration>,
    pub validation: StepSettings,
    pub payment: StepSettings,
    pub shipping: StepSettings,
    pub notification: StepSettings,
}

impl Default for OrderSequenceConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            maximum_delay: None,
            validation: StepSettings::new(3, Duration::from_secs(30)),
            payment: StepSettings::new(5, Duration::from_secs(60)),
            shipping: StepSettings::new(3, Duration::from_secs(30)),
            notification: StepSettings::new(2, Duration::from_secs(20)),
        }
    }
}

impl OrderSequenceConfig {
    /// Sets the delay before the first retry of every step.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Caps the delay between attempts.
    pub fn with_maximum_delay(mut self, maximum_delay: Duration) -> Self {
        self.maximum_delay = Some(maximum_delay);
        self
    }

    /// Builds the retry policy for a step.
    pub fn retry_policy(&self, settings: &StepSettings) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.initial_delay,
            self.backoff_multiplier,
            settings.max_attempts,
        );
        match self.maximum_delay {
            Some(cap) => policy.with_maximum_delay(cap),
            None => policy,
        }
    }
}
