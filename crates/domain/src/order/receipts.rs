//! Receipts produced by the payment and shipping steps.

use serde::{Deserialize, Serialize};

/// State of a payment reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Charged,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Charged => "charged",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of charging an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub transaction_id: String,
    pub status: PaymentStatus,
}

impl PaymentResult {
    /// Creates a receipt for a successful charge.
    pub fn charged(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: PaymentStatus::Charged,
        }
    }
}

/// Shipping carriers an order can be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Carrier {
    FedEx,
    #[serde(rename = "UPS")]
    Ups,
    #[serde(rename = "USPS")]
    Usps,
    #[serde(rename = "DHL")]
    Dhl,
}

impl Carrier {
    /// Every supported carrier.
    pub const ALL: [Carrier; 4] = [Carrier::FedEx, Carrier::Ups, Carrier::Usps, Carrier::Dhl];

    /// Returns the carrier's display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Carrier::FedEx => "FedEx",
            Carrier::Ups => "UPS",
            Carrier::Usps => "USPS",
            Carrier::Dhl => "DHL",
        }
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of handing an order to a carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentResult {
    pub tracking_number: String,
    pub carrier: Carrier,
}

impl ShipmentResult {
    pub fn new(tracking_number: impl Into<String>, carrier: Carrier) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            carrier,
        }
    }
}
