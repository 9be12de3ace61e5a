//! Typed view of an order run's result.

use chrono::{DateTime, Utc};
use common::RunId;
use domain::{PaymentResult, ShipmentResult};
use orchestrator::{AbsorbedFailure, AggregatedResult, OrchestratorError, RunFailure, RunStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order_sequence::{STEP_NOTIFICATION, STEP_PAYMENT, STEP_SHIPPING};

/// What an order run produced.
///
/// `status` is `completed`, `<step>_failed` or `cancelled`. Receipts are
/// present for every step that completed before the run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub run_id: RunId,
    pub status: RunStatus,
    pub payment: Option<PaymentResult>,
    pub shipment: Option<ShipmentResult>,
    pub notified: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed_failures: Vec<AbsorbedFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OrderResult {
    /// Reads the receipts out of an aggregated run result.
    pub fn from_aggregated(result: &AggregatedResult) -> Self {
        Self {
            order_id: result.id().to_string(),
            run_id: result.run_id(),
            status: result.status().clone(),
            payment: receipt(result, STEP_PAYMENT),
            shipment: receipt(result, STEP_SHIPPING),
            notified: result.completed_steps().iter().any(|s| s == STEP_NOTIFICATION),
            absorbed_failures: result.absorbed_failures().to_vec(),
            error: result.failure_reason().map(str::to_string),
            started_at: result.started_at(),
            finished_at: result.finished_at(),
        }
    }

    /// Returns true if every required step succeeded.
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

impl From<&AggregatedResult> for OrderResult {
    fn from(result: &AggregatedResult) -> Self {
        Self::from_aggregated(result)
    }
}

fn receipt<T: DeserializeOwned>(result: &AggregatedResult, step: &str) -> Option<T> {
    match result.slot_as(step) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(run_id = %result.run_id(), step, error = %e, "Unreadable step value");
            None
        }
    }
}

/// An order run that stopped before completing.
#[derive(Debug, Error)]
#[error("Order '{}' ended as {}: {error}", .result.order_id, .result.status)]
pub struct OrderRunFailure {
    /// Everything the run produced before it stopped.
    pub result: OrderResult,
    /// Why the run stopped.
    #[source]
    pub error: OrchestratorError,
}

impl OrderRunFailure {
    /// Returns the step that stopped the run.
    pub fn failed_step(&self) -> Option<&str> {
        self.error.step()
    }

    /// Returns true if the run was cancelled or hit its deadline.
    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancellation()
    }
}

impl From<RunFailure> for OrderRunFailure {
    fn from(failure: RunFailure) -> Self {
        Self {
            result: OrderResult::from_aggregated(&failure.result),
            error: failure.error,
        }
    }
}
