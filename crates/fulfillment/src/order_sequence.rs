//! The order fulfillment sequence.

use std::sync::Arc;

use domain::Order;
use orchestrator::{Sequence, Step};

use crate::actions::{ChargePayment, NotifyCustomer, ShipOrder, ValidateOrder};
use crate::config::OrderSequenceConfig;
use crate::error::Result;
use crate::services::FulfillmentServices;

/// The sequence name used in run events and results.
pub const SEQUENCE_NAME: &str = "order_fulfillment";

/// Step name: Reject structurally invalid orders.
pub const STEP_VALIDATION: &str = "validation";

/// Step name: Charge the order total.
pub const STEP_PAYMENT: &str = "payment";

/// Step name: Hand the order to a carrier.
pub const STEP_SHIPPING: &str = "shipping";

/// Step name: Email the customer (best-effort).
pub const STEP_NOTIFICATION: &str = "notification";

/// Builds `validation → payment → shipping → notification`.
///
/// The first three steps are required; a notification failure is absorbed.
pub fn build_order_sequence(
    services: &FulfillmentServices,
    config: &OrderSequenceConfig,
) -> Result<Sequence<Order>> {
    let validation = Step::<Order>::required(
        STEP_VALIDATION,
        ValidateOrder,
        config.retry_policy(&config.validation),
    )?
    .with_timeout(config.validation.timeout)?;

    let payment = Step::<Order>::required(
        STEP_PAYMENT,
        ChargePayment(Arc::clone(&services.payment)),
        config.retry_policy(&config.payment),
    )?
    .with_timeout(config.payment.timeout)?;

    let shipping = Step::<Order>::required(
        STEP_SHIPPING,
        ShipOrder(Arc::clone(&services.shipping)),
        config.retry_policy(&config.shipping),
    )?
    .with_timeout(config.shipping.timeout)?;

    let notification = Step::<Order>::best_effort(
        STEP_NOTIFICATION,
        NotifyCustomer(Arc::clone(&services.notification)),
        config.retry_policy(&config.notification),
    )?
    .with_timeout(config.notification.timeout)?;

    let sequence = Sequence::builder(SEQUENCE_NAME)
        .step(validation)
        .step(payment)
        .step(shipping)
        .step(notification)
        .build()?;
    Ok(sequence)
}
