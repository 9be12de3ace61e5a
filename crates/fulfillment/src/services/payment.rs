//! Payment service trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use domain::{Money, Order, PaymentResult};

use super::{FaultInjector, History, simulate_latency};
use crate::error::ServiceError;

const SERVICE: &str = "payment gateway";

/// Trait for charging orders.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the order's total to its customer.
    async fn charge(&self, order: &Order) -> Result<PaymentResult, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    charges: History<(String, Money, PaymentResult)>,
    calls: u64,
    faults: FaultInjector,
}

/// Simulated payment gateway.
///
/// By default every charge succeeds. Outages can be injected for a number
/// of calls, permanently, or at random with a fixed probability.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway that is unavailable for a random share of calls.
    pub fn with_failure_rate(rate: f64) -> Self {
        let service = Self::new();
        service.write().faults.set_failure_rate(rate);
        service
    }

    /// Makes the next `calls` charges fail as unavailable.
    pub fn fail_next(&self, calls: u32) {
        self.write().faults.fail_next(calls);
    }

    /// Makes every charge fail as unavailable until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().faults.set_unavailable(unavailable);
    }

    /// Delays every successful charge.
    pub fn set_latency(&self, latency: std::time::Duration) {
        self.write().faults.set_latency(latency);
    }

    /// Returns the number of charge calls, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.read().calls
    }

    /// Returns the number of successful charges.
    pub fn charge_count(&self) -> u64 {
        self.read().charges.total()
    }

    /// Returns the amount of the most recent charge for an order, if it is
    /// still among the remembered charges.
    pub fn charged_amount(&self, order_id: &str) -> Option<Money> {
        self.read()
            .charges
            .iter()
            .rev()
            .find(|(id, _, _)| id == order_id)
            .map(|(_, amount, _)| *amount)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPaymentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(&self, order: &Order) -> Result<PaymentResult, ServiceError> {
        tracing::info!(order_id = %order.order_id, amount = %order.total_amount, "Processing payment");

        let latency = {
            let mut state = self.write();
            state.calls = state.calls.saturating_add(1);
            if state.faults.should_fail() {
                return Err(ServiceError::unavailable(SERVICE));
            }
            state.faults.latency()
        };
        simulate_latency(latency).await;

        let receipt = PaymentResult::charged(format!(
            "txn-{}-{}",
            order.order_id,
            Utc::now().timestamp_millis()
        ));
        self.write()
            .charges
            .push((order.order_id.clone(), order.total_amount, receipt.clone()));

        tracing::info!(
            order_id = %order.order_id,
            transaction_id = %receipt.transaction_id,
            "Payment processed"
        );
        Ok(receipt)
    }
}
