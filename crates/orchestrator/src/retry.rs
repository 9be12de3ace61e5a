//! Retry policy with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// How often a step is attempted and how long to wait between attempts.
///
/// No wait precedes attempt 1. Attempt `k >= 2` waits
/// `initial_delay * backoff_multiplier^(k-2)`, clamped to `maximum_delay`
/// when one is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    initial_delay: Duration,
    backoff_multiplier: f64,
    max_attempts: u32,
    maximum_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy. Values are checked when the policy is attached to a step.
    pub fn new(initial_delay: Duration, backoff_multiplier: f64, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            backoff_multiplier,
            max_attempts,
            maximum_delay: None,
        }
    }

    /// Caps every computed delay at `maximum_delay`.
    pub fn with_maximum_delay(mut self, maximum_delay: Duration) -> Self {
        self.maximum_delay = Some(maximum_delay);
        self
    }

    /// Returns the delay before the second attempt.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns the growth factor applied per retry.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Returns the total number of attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay cap, if any.
    pub fn maximum_delay(&self) -> Option<Duration> {
        self.maximum_delay
    }

    /// Returns how long to wait before the given 1-indexed attempt.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let delay = if attempt == 2 {
            self.initial_delay
        } else {
            let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
            let factor = self.backoff_multiplier.powi(exponent);
            Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
                .unwrap_or(Duration::MAX)
        };

        match self.maximum_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Checks the policy invariants on behalf of the named step.
    pub(crate) fn validate(&self, step: &str) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(OrchestratorError::configuration(
                step,
                "max_attempts must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(OrchestratorError::configuration(
                step,
                format!(
                    "backoff_multiplier must be a finite number >= 1, got {}",
                    self.backoff_multiplier
                ),
            ));
        }
        if self.initial_delay.is_zero() {
            return Err(OrchestratorError::configuration(
                step,
                "initial_delay must be greater than zero",
            ));
        }
        if let Some(cap) = self.maximum_delay
            && cap < self.initial_delay
        {
            return Err(OrchestratorError::configuration(
                step,
                format!(
                    "maximum_delay {cap:?} is shorter than initial_delay {:?}",
                    self.initial_delay
                ),
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, 3)
    }
}
