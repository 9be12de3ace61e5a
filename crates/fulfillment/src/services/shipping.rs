//! Shipping service trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use domain::{Carrier, Order, ShipmentResult};
use rand::Rng;

use super::{FaultInjector, History, simulate_latency};
use crate::error::ServiceError;

const SERVICE: &str = "shipping service";

/// Trait for handing orders to a carrier.
#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Books a shipment for the order.
    async fn ship(&self, order: &Order) -> Result<ShipmentResult, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryShippingState {
    shipments: History<(String, ShipmentResult)>,
    calls: u64,
    carrier: Option<Carrier>,
    faults: FaultInjector,
}

/// Simulated shipping service.
///
/// Picks a random carrier for each shipment unless one is pinned.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShippingService {
    state: Arc<RwLock<InMemoryShippingState>>,
}

impl InMemoryShippingService {
    /// Creates a new in-memory shipping service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always ships with `carrier`.
    pub fn with_carrier(carrier: Carrier) -> Self {
        let service = Self::new();
        service.write().carrier = Some(carrier);
        service
    }

    /// Makes the next `calls` shipments fail as unavailable.
    pub fn fail_next(&self, calls: u32) {
        self.write().faults.fail_next(calls);
    }

    /// Makes every shipment fail as unavailable until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().faults.set_unavailable(unavailable);
    }

    /// Delays every successful shipment.
    pub fn set_latency(&self, latency: Duration) {
        self.write().faults.set_latency(latency);
    }

    /// Returns the number of ship calls, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.read().calls
    }

    /// Returns the number of booked shipments.
    pub fn shipment_count(&self) -> u64 {
        self.read().shipments.total()
    }

    /// Returns the shipment booked for an order, if any.
    pub fn shipment_for(&self, order_id: &str) -> Option<ShipmentResult> {
        self.read()
            .shipments
            .iter()
            .rev()
            .find(|(id, _)| id == order_id)
            .map(|(_, shipment)| shipment.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryShippingState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryShippingState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn random_carrier() -> Carrier {
    let index = rand::thread_rng().gen_range(0..Carrier::ALL.len());
    Carrier::ALL[index]
}

#[async_trait]
impl ShippingService for InMemoryShippingService {
    async fn ship(&self, order: &Order) -> Result<ShipmentResult, ServiceError> {
        tracing::info!(order_id = %order.order_id, "Shipping order");

        let (latency, pinned) = {
            let mut state = self.write();
            state.calls = state.calls.saturating_add(1);
            if state.faults.should_fail() {
                return Err(ServiceError::unavailable(SERVICE));
            }
            (state.faults.latency(), state.carrier)
        };
        simulate_latency(latency).await;

        let carrier = pinned.unwrap_or_else(random_carrier);
        let shipment = ShipmentResult::new(
            format!("TRK-{}-{}", order.order_id, Utc::now().timestamp_millis()),
            carrier,
        );
        self.write()
            .shipments
            .push((order.order_id.clone(), shipment.clone()));

        tracing::info!(
            order_id = %order.order_id,
            tracking = %shipment.tracking_number,
            carrier = %shipment.carrier,
            "Order shipped"
        );
        Ok(shipment)
    }
}
