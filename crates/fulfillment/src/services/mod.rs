//! External service traits and in-memory implementations for the
//! fulfillment steps.

pub mod notification;
pub mod payment;
pub mod shipping;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

pub use notification::{InMemoryNotificationService, Notification, NotificationService};
pub use payment::{InMemoryPaymentService, PaymentService};
pub use shipping::{InMemoryShippingService, ShippingService};

/// The collaborators the order sequence calls into.
#[derive(Clone)]
pub struct FulfillmentServices {
    pub payment: Arc<dyn PaymentService>,
    pub shipping: Arc<dyn ShippingService>,
    pub notification: Arc<dyn NotificationService>,
}

impl FulfillmentServices {
    pub fn new(
        payment: Arc<dyn PaymentService>,
        shipping: Arc<dyn ShippingService>,
        notification: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            payment,
            shipping,
            notification,
        }
    }
}

impl Default for FulfillmentServices {
    fn default() -> Self {
        Self::new(
            Arc::new(InMemoryPaymentService::new()),
            Arc::new(InMemoryShippingService::new()),
            Arc::new(InMemoryNotificationService::new()),
        )
    }
}

/// Failure injection shared by the in-memory services.
#[derive(Debug, Default)]
pub(crate) struct FaultInjector {
    fail_next: u32,
    unavailable: bool,
    failure_rate: f64,
    latency: Duration,
}

impl FaultInjector {
    pub(crate) fn fail_next(&mut self, calls: u32) {
        self.fail_next = calls;
    }

    pub(crate) fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Sets the probability of a random outage, clamped to `[0, 1]`.
    pub(crate) fn set_failure_rate(&mut self, rate: f64) {
        self.failure_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
    }

    pub(crate) fn set_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    pub(crate) fn latency(&self) -> Duration {
        self.latency
    }

    /// Decides whether the current call fails.
    pub(crate) fn should_fail(&mut self) -> bool {
        if self.unavailable {
            return true;
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate)
    }
}

/// Number of recent outputs each in-memory service remembers.
pub const HISTORY_LIMIT: usize = 256;

/// Recent outputs of an in-memory service, oldest first.
///
/// Holds at most [`HISTORY_LIMIT`] entries; the lifetime total keeps
/// counting past that.
#[derive(Debug)]
pub(crate) struct History<T> {
    entries: VecDeque<T>,
    total: u64,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
            total: 0,
        }
    }
}

impl<T> History<T> {
    pub(crate) fn push(&mut self, entry: T) {
        if self.entries.len() == HISTORY_LIMIT {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total = self.total.saturating_add(1);
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }
}

/// Sleeps for a simulated service latency.
pub(crate) async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
