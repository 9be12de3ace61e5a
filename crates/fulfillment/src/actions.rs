//! Step actions wrapping the fulfillment services.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Order, ShipmentResult};
use orchestrator::{ActionError, AggregatedResult, StepAction, StepValue};
use serde::Serialize;

use crate::error::ServiceError;
use crate::order_sequence::STEP_SHIPPING;
use crate::services::{NotificationService, PaymentService, ShippingService};

fn to_value<T: Serialize>(receipt: &T) -> Result<StepValue, ActionError> {
    serde_json::to_value(receipt)
        .map(Some)
        .map_err(|e| ActionError::fatal(format!("unserializable receipt: {e}")))
}

/// Rejects structurally invalid orders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOrder;

#[async_trait]
impl StepAction<Order> for ValidateOrder {
    async fn invoke(&self, order: &Order, _: &AggregatedResult) -> Result<StepValue, ActionError> {
        tracing::info!(order_id = %order.order_id, "Validating order");
        order.validate().map_err(ServiceError::from)?;
        tracing::info!(order_id = %order.order_id, "Order validated successfully");
        Ok(None)
    }
}

/// Charges the order total.
pub struct ChargePayment(pub Arc<dyn PaymentService>);

#[async_trait]
impl StepAction<Order> for ChargePayment {
    async fn invoke(&self, order: &Order, _: &AggregatedResult) -> Result<StepValue, ActionError> {
        let receipt = self.0.charge(order).await?;
        to_value(&receipt)
    }
}

/// Books a shipment.
pub struct ShipOrder(pub Arc<dyn ShippingService>);

#[async_trait]
impl StepAction<Order> for ShipOrder {
    async fn invoke(&self, order: &Order, _: &AggregatedResult) -> Result<StepValue, ActionError> {
        let shipment = self.0.ship(order).await?;
        to_value(&shipment)
    }
}

/// Sends the shipping confirmation, quoting the tracking number booked by
/// the shipping step.
pub struct NotifyCustomer(pub Arc<dyn NotificationService>);

#[async_trait]
impl StepAction<Order> for NotifyCustomer {
    async fn invoke(
        &self,
        order: &Order,
        progress: &AggregatedResult,
    ) -> Result<StepValue, ActionError> {
        let shipment: Option<ShipmentResult> = progress
            .slot_as(STEP_SHIPPING)
            .map_err(|e| ActionError::fatal(e.to_string()))?;
        self.0.notify(order, shipment.as_ref()).await?;
        Ok(None)
    }
}
