//! Domain error types.

use thiserror::Error;

/// Structural problems that make an order impossible to fulfill.
///
/// The messages are part of the run result returned to callers, so they
/// stay short and lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order ID is required")]
    OrderIdRequired,

    #[error("customer ID is required")]
    CustomerIdRequired,

    #[error("order must contain at least one item")]
    NoItems,

    #[error("total amount must be positive")]
    NonPositiveTotal,

    #[error("email is required")]
    EmailRequired,

    /// An item carries a zero quantity.
    #[error("item {sku} has invalid quantity {quantity}")]
    InvalidQuantity { sku: String, quantity: u32 },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, OrderError>;
