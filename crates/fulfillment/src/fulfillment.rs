//! Entry point for fulfilling orders.

use std::sync::Arc;

use domain::Order;
use orchestrator::{CancellationToken, Sequence, SequenceOrchestrator};

use crate::config::OrderSequenceConfig;
use crate::error::Result;
use crate::order_sequence::build_order_sequence;
use crate::result::{OrderResult, OrderRunFailure};
use crate::services::FulfillmentServices;

/// Runs orders through the fulfillment sequence.
///
/// Cheap to clone; clones share the sequence and the orchestrator's event
/// sink and checkpointer.
#[derive(Clone)]
pub struct OrderFulfillment {
    orchestrator: SequenceOrchestrator,
    sequence: Arc<Sequence<Order>>,
}

impl OrderFulfillment {
    /// Builds the order sequence over `services`.
    pub fn new(
        orchestrator: SequenceOrchestrator,
        services: &FulfillmentServices,
        config: &OrderSequenceConfig,
    ) -> Result<Self> {
        Ok(Self {
            orchestrator,
            sequence: Arc::new(build_order_sequence(services, config)?),
        })
    }

    /// Runs `order` to completion.
    pub async fn run_order_sequence(
        &self,
        order: &Order,
    ) -> std::result::Result<OrderResult, OrderRunFailure> {
        self.run_order_sequence_with(order, CancellationToken::new())
            .await
    }

    /// Runs `order`, stopping early once `cancel` fires.
    #[tracing::instrument(skip(self, order, cancel), fields(order_id = %order.order_id))]
    pub async fn run_order_sequence_with(
        &self,
        order: &Order,
        cancel: CancellationToken,
    ) -> std::result::Result<OrderResult, OrderRunFailure> {
        tracing::info!("Order sequence started");

        match self
            .orchestrator
            .run(&*self.sequence, order, order.order_id.clone(), cancel)
            .await
        {
            Ok(result) => {
                let result = OrderResult::from_aggregated(&result);
                tracing::info!(
                    transaction_id = ?result.payment.as_ref().map(|p| &p.transaction_id),
                    tracking = ?result.shipment.as_ref().map(|s| &s.tracking_number),
                    "Order sequence completed"
                );
                Ok(result)
            }
            Err(failure) => {
                let failure = OrderRunFailure::from(failure);
                tracing::warn!(status = %failure.result.status, error = %failure.error, "Order sequence stopped");
                Err(failure)
            }
        }
    }
}
