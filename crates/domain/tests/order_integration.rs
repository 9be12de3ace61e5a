//! Integration tests for the order model.
//!
//! These tests exercise orders the way the storefront submits them: as JSON
//! bodies that may be incomplete.

use domain::{Address, Carrier, Money, Order, OrderError, OrderItem, PaymentResult, ShipmentResult};
use serde_json::json;

fn sample_order_json() -> serde_json::Value {
    json!({
        "order_id": "order-001",
        "customer_id": "cust-123",
        "email": "customer@example.com",
        "items": [
            {"sku": "SKU-001", "name": "Widget A", "quantity": 2, "price": 29.99},
            {"sku": "SKU-002", "name": "Widget B", "quantity": 1, "price": 25.00},
            {"sku": "SKU-003", "name": "Widget C", "quantity": 1, "price": 15.02}
        ],
        "address": {
            "street": "123 Main St",
            "city": "San Francisco",
            "state": "CA",
            "zip_code": "94102",
            "country": "USA"
        },
        "total_amount": 99.99
    })
}

mod wire_format {
    use super::*;

    #[test]
    fn sample_order_parses_and_validates() {
        let order: Order = serde_json::from_value(sample_order_json()).unwrap();

        assert_eq!(order.order_id, "order-001");
        assert_eq!(order.customer_id.as_str(), "cust-123");
        assert_eq!(order.items.len(), 3);
        assert_eq!(order.items[0].price, Money::from_cents(2999));
        assert_eq!(order.total_amount.cents(), 9999);
        assert_eq!(order.address.zip_code, "94102");
        assert!(order.validate().is_ok());
    }

    #[test]
    fn order_serializes_with_snake_case_fields() {
        let order: Order = serde_json::from_value(sample_order_json()).unwrap();
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(value, sample_order_json());
    }

    #[test]
    fn receipts_use_snake_case_field_names() {
        let payment = serde_json::to_value(PaymentResult::charged("txn-1")).unwrap();
        assert_eq!(payment["transaction_id"], "txn-1");
        assert_eq!(payment["status"], "charged");

        let shipment = serde_json::to_value(ShipmentResult::new("TRK-1", Carrier::FedEx)).unwrap();
        assert_eq!(shipment["tracking_number"], "TRK-1");
        assert_eq!(shipment["carrier"], "FedEx");
    }
}

mod validation {
    use super::*;

    fn without(field: &str) -> Order {
        let mut value = sample_order_json();
        value.as_object_mut().unwrap().remove(field);
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn each_required_field_is_reported() {
        assert_eq!(without("order_id").validate(), Err(OrderError::OrderIdRequired));
        assert_eq!(without("customer_id").validate(), Err(OrderError::CustomerIdRequired));
        assert_eq!(without("items").validate(), Err(OrderError::NoItems));
        assert_eq!(without("total_amount").validate(), Err(OrderError::NonPositiveTotal));
        assert_eq!(without("email").validate(), Err(OrderError::EmailRequired));
    }

    #[test]
    fn missing_address_is_not_a_validation_error() {
        assert!(without("address").validate().is_ok());
    }

    #[test]
    fn negative_total_is_rejected() {
        let order = Order::new("order-002", "cust-1", "a@b.c", Address::default())
            .with_item(OrderItem::new("SKU-001", "Widget", 1, Money::from_cents(100)))
            .with_total(Money::from_cents(-100));

        assert_eq!(
            order.validate().unwrap_err().to_string(),
            "total amount must be positive"
        );
    }
}
