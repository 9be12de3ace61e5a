//! Order model and fulfillment receipts.

mod model;
mod receipts;
mod value_objects;

pub use model::Order;
pub use receipts::{Carrier, PaymentResult, PaymentStatus, ShipmentResult};
pub use value_objects::{Address, CustomerId, Money, OrderItem};
