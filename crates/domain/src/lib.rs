//! Domain layer for order fulfillment.
//!
//! This crate provides the order model that flows through the fulfillment
//! sequence:
//! - `Order` with its items, shipping address and total
//! - Structural validation rules reported as `OrderError`
//! - Payment and shipment receipts produced by the fulfillment steps

pub mod error;
pub mod order;

pub use error::{OrderError, Result};
pub use order::{
    Address, Carrier, CustomerId, Money, Order, OrderItem, PaymentResult, PaymentStatus,
    ShipmentResult,
};
