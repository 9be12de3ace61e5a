//! End-to-end tests running orders through the fulfillment sequence.
//!
//! Time is paused, so the one-second backoffs between attempts elapse
//! instantly.

use std::sync::Arc;
use std::time::Duration;

use domain::{Address, Carrier, Money, Order, OrderItem};
use fulfillment::{
    FulfillmentServices, InMemoryNotificationService, InMemoryPaymentService,
    InMemoryShippingService, OrderFulfillment, OrderSequenceConfig, STEP_NOTIFICATION,
    STEP_PAYMENT, STEP_SHIPPING,
};
use orchestrator::{
    CancellationToken, InMemoryCheckpointStore, InMemoryEventSink, OrchestratorConfig,
    OrchestratorError, RunStatus, SequenceOrchestrator,
};

fn sample_order() -> Order {
    Order::new(
        "order-001",
        "cust-123",
        "customer@example.com",
        Address::new("123 Main St", "San Francisco", "CA", "94102", "USA"),
    )
    .with_item(OrderItem::new("SKU-001", "Widget A", 2, Money::from_cents(2999)))
    .with_item(OrderItem::new("SKU-002", "Widget B", 1, Money::from_cents(2500)))
    .with_item(OrderItem::new("SKU-003", "Widget C", 1, Money::from_cents(1501)))
}

struct TestHarness {
    fulfillment: OrderFulfillment,
    payment: InMemoryPaymentService,
    shipping: InMemoryShippingService,
    notification: InMemoryNotificationService,
    sink: InMemoryEventSink,
    checkpoints: InMemoryCheckpointStore,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    fn with_config(config: OrchestratorConfig) -> Self {
        let payment = InMemoryPaymentService::new();
        let shipping = InMemoryShippingService::with_carrier(Carrier::Ups);
        let notification = InMemoryNotificationService::new();
        let sink = InMemoryEventSink::new();
        let checkpoints = InMemoryCheckpointStore::new();

        let services = FulfillmentServices::new(
            Arc::new(payment.clone()),
            Arc::new(shipping.clone()),
            Arc::new(notification.clone()),
        );
        let orchestrator = SequenceOrchestrator::new(config)
            .with_event_sink(Arc::new(sink.clone()))
            .with_checkpointer(Arc::new(checkpoints.clone()));
        let fulfillment =
            OrderFulfillment::new(orchestrator, &services, &OrderSequenceConfig::default())
                .unwrap();

        Self {
            fulfillment,
            payment,
            shipping,
            notification,
            sink,
            checkpoints,
        }
    }
}

mod happy_path {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn payment_recovers_after_two_outages() {
        let h = TestHarness::new();
        h.payment.fail_next(2);

        let result = h.fulfillment.run_order_sequence(&sample_order()).await.unwrap();

        assert_eq!(result.status.to_string(), "completed");
        assert_eq!(h.payment.call_count(), 3);
        assert_eq!(h.payment.charged_amount("order-001"), Some(Money::from_cents(9999)));

        let payment = result.payment.unwrap();
        assert!(payment.transaction_id.starts_with("txn-order-001-"));
        let shipment = result.shipment.unwrap();
        assert!(shipment.tracking_number.starts_with("TRK-order-001-"));
        assert_eq!(shipment.carrier, Carrier::Ups);

        assert!(result.notified);
        assert_eq!(
            h.notification.sent()[0].tracking_number.as_deref(),
            Some(shipment.tracking_number.as_str())
        );
        assert_eq!(h.sink.attempts_for(STEP_PAYMENT), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn payment_retries_follow_backoff() {
        let h = TestHarness::new();
        h.payment.fail_next(3);

        let started = tokio::time::Instant::now();
        h.fulfillment.run_order_sequence(&sample_order()).await.unwrap();

        // 1s + 2s + 4s before the fourth payment attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoint_follows_every_step() {
        let h = TestHarness::new();

        let result = h.fulfillment.run_order_sequence(&sample_order()).await.unwrap();

        // One write per step plus the terminal write.
        assert_eq!(h.checkpoints.write_count().await, 5);
        let latest = h.checkpoints.latest_for_subject("order-001").await.unwrap();
        assert_eq!(latest.run_id(), result.run_id);
        assert_eq!(latest.status(), &RunStatus::Completed);
        assert!(latest.slot(STEP_SHIPPING).is_some());
    }
}

mod failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn missing_order_id_fails_validation() {
        let h = TestHarness::new();
        let mut order = sample_order();
        order.order_id = String::new();

        let failure = h.fulfillment.run_order_sequence(&order).await.unwrap_err();

        assert_eq!(failure.result.status.to_string(), "validation_failed");
        assert!(matches!(failure.error, OrchestratorError::StepFatal { .. }));
        assert!(failure.result.error.as_deref().unwrap().contains("order ID is required"));
        assert_eq!(h.payment.call_count(), 0);
        assert_eq!(h.shipping.call_count(), 0);
        assert_eq!(h.notification.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn payment_outage_exhausts_five_attempts() {
        let h = TestHarness::new();
        h.payment.set_unavailable(true);

        let failure = h
            .fulfillment
            .run_order_sequence(&sample_order())
            .await
            .unwrap_err();

        assert_eq!(failure.result.status.to_string(), "payment_failed");
        assert!(matches!(
            failure.error,
            OrchestratorError::StepExhausted { attempts: 5, .. }
        ));
        assert_eq!(h.payment.call_count(), 5);
        assert_eq!(h.shipping.call_count(), 0);
        assert!(failure.result.payment.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn notification_failure_is_absorbed() {
        let h = TestHarness::new();
        h.notification.set_unavailable(true);

        let result = h.fulfillment.run_order_sequence(&sample_order()).await.unwrap();

        assert_eq!(result.status.to_string(), "completed");
        assert!(!result.notified);
        assert_eq!(h.notification.call_count(), 2);
        assert_eq!(result.absorbed_failures.len(), 1);
        assert_eq!(result.absorbed_failures[0].step, STEP_NOTIFICATION);
        assert!(h.sink.event_types().contains(&"FailureAbsorbed"));
    }
}

mod cancellation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_payment_backoff() {
        let h = TestHarness::new();
        h.payment.set_unavailable(true);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let failure = h
            .fulfillment
            .run_order_sequence_with(&sample_order(), token)
            .await
            .unwrap_err();

        // Attempts at t=0 and t=1s; cancelled while waiting for t=3s.
        assert_eq!(h.payment.call_count(), 2);
        assert_eq!(h.shipping.call_count(), 0);
        assert!(failure.is_cancelled());
        assert_eq!(failure.result.status.to_string(), "cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn run_deadline_cancels_the_order() {
        let h = TestHarness::with_config(
            OrchestratorConfig::new().with_run_deadline(Duration::from_secs(5)),
        );
        h.payment.set_unavailable(true);

        let failure = h
            .fulfillment
            .run_order_sequence(&sample_order())
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            OrchestratorError::DeadlineExceeded { .. }
        ));
        assert_eq!(failure.result.status, RunStatus::Cancelled);
        // Attempts at t=0, 1s and 3s; the next would be at 7s.
        assert_eq!(h.payment.call_count(), 3);
    }
}
