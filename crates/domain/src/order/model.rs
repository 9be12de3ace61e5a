//! The order submitted for fulfillment.

use serde::{Deserialize, Serialize};

use super::{Address, CustomerId, Money, OrderItem};
use crate::error::{OrderError, Result};

/// An order as received from the storefront.
///
/// Missing fields deserialize to their empty defaults so that an incomplete
/// order reaches [`Order::validate`] and is rejected with a precise reason
/// rather than failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_id: String,
    pub customer_id: CustomerId,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub address: Address,
    pub total_amount: Money,
}

impl Order {
    /// Creates an order with no items and a zero total.
    pub fn new(
        order_id: impl Into<String>,
        customer_id: impl Into<CustomerId>,
        email: impl Into<String>,
        address: Address,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            email: email.into(),
            items: Vec::new(),
            address,
            total_amount: Money::zero(),
        }
    }

    /// Adds an item and grows the total by its price.
    pub fn with_item(mut self, item: OrderItem) -> Self {
        self.total_amount = self.total_amount + item.total_price();
        self.items.push(item);
        self
    }

    /// Overrides the order total.
    pub fn with_total(mut self, total_amount: Money) -> Self {
        self.total_amount = total_amount;
        self
    }

    /// Returns the sum of all item totals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::total_price).sum()
    }

    /// Returns the number of units across all items.
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Checks that the order can be fulfilled.
    ///
    /// Rules are checked in a fixed order and the first violation wins.
    pub fn validate(&self) -> Result<()> {
        if self.order_id.trim().is_empty() {
            return Err(OrderError::OrderIdRequired);
        }
        if self.customer_id.is_blank() {
            return Err(OrderError::CustomerIdRequired);
        }
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if !self.total_amount.is_positive() {
            return Err(OrderError::NonPositiveTotal);
        }
        if self.email.trim().is_empty() {
            return Err(OrderError::EmailRequired);
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                sku: item.sku.clone(),
                quantity: item.quantity,
            });
        }
        Ok(())
    }
}
