//! Order fulfillment on top of the step orchestrator.
//!
//! Every order runs through four steps:
//! 1. `validation`: reject structurally invalid orders (never retried)
//! 2. `payment`: charge the order total
//! 3. `shipping`: book a shipment with a carrier
//! 4. `notification`: email the customer; a failure here is logged and
//!    absorbed
//!
//! The first failing required step stops the run with status
//! `<step>_failed`.

pub mod actions;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod order_sequence;
pub mod result;
pub mod services;

pub use config::{OrderSequenceConfig, StepSettings};
pub use error::{FulfillmentError, ServiceError};
pub use fulfillment::OrderFulfillment;
pub use order_sequence::{
    SEQUENCE_NAME, STEP_NOTIFICATION, STEP_PAYMENT, STEP_SHIPPING, STEP_VALIDATION,
    build_order_sequence,
};
pub use result::{OrderResult, OrderRunFailure};
pub use services::{
    FulfillmentServices, InMemoryNotificationService, InMemoryPaymentService,
    InMemoryShippingService, Notification, NotificationService, PaymentService, ShippingService,
};
