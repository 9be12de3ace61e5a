//! Customer notification service.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Order, ShipmentResult};
use serde::{Deserialize, Serialize};

use super::{FaultInjector, History, simulate_latency};
use crate::error::ServiceError;

const SERVICE: &str = "notification service";

/// A message sent to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub order_id: String,
    pub email: String,
    pub tracking_number: Option<String>,
}

/// Trait for telling customers about their order.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends the shipping confirmation for an order.
    async fn notify(
        &self,
        order: &Order,
        shipment: Option<&ShipmentResult>,
    ) -> Result<Notification, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: History<Notification>,
    calls: u64,
    faults: FaultInjector,
}

/// Records notifications instead of sending email.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `calls` notifications fail as unavailable.
    pub fn fail_next(&self, calls: u32) {
        self.write().faults.fail_next(calls);
    }

    /// Makes every notification fail as unavailable until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().faults.set_unavailable(unavailable);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.write().faults.set_latency(latency);
    }

    pub fn call_count(&self) -> u64 {
        self.read().calls
    }

    /// Returns the most recent notifications, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.read().sent.iter().cloned().collect()
    }

    /// Returns the number of notifications sent.
    pub fn sent_count(&self) -> u64 {
        self.read().sent.total()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryNotificationState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryNotificationState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn notify(
        &self,
        order: &Order,
        shipment: Option<&ShipmentResult>,
    ) -> Result<Notification, ServiceError> {
        let notification = Notification {
            order_id: order.order_id.clone(),
            email: order.email.clone(),
            tracking_number: shipment.map(|s| s.tracking_number.clone()),
        };
        tracing::info!(
            order_id = %notification.order_id,
            email = %notification.email,
            tracking = ?notification.tracking_number,
            "Sending notification"
        );

        let latency = {
            let mut state = self.write();
            state.calls = state.calls.saturating_add(1);
            if state.faults.should_fail() {
                return Err(ServiceError::unavailable(SERVICE));
            }
            state.faults.latency()
        };
        simulate_latency(latency).await;

        self.write().sent.push(notification.clone());
        tracing::info!(order_id = %notification.order_id, "Notification sent");
        Ok(notification)
    }
}
