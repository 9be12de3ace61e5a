//! Order fulfillment worker.
//!
//! Hosts the order sequence behind a small HTTP surface, with structured
//! logging (tracing) and Prometheus metrics. At most `NUM_WORKERS` orders
//! run at once; a shutdown signal cancels in-flight runs at their next
//! backoff wait and stops new ones from starting.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use fulfillment::{
    FulfillmentServices, InMemoryNotificationService, InMemoryPaymentService,
    InMemoryShippingService, OrderFulfillment, OrderSequenceConfig,
};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{CancellationToken, InMemoryCheckpointStore, OrchestratorConfig, SequenceOrchestrator};
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::WorkerConfig;
use error::WorkerError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub fulfillment: OrderFulfillment,
    pub checkpoints: InMemoryCheckpointStore,
    pub workers: Arc<Semaphore>,
    pub num_workers: usize,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Cancels in-flight runs and refuses new ones.
    pub fn begin_shutdown(&self) {
        self.workers.close();
        self.shutdown.cancel();
    }

    /// Returns the number of orders currently running.
    pub fn in_flight(&self) -> usize {
        self.num_workers
            .saturating_sub(self.workers.available_permits())
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::submit))
        .route("/orders/{id}", get(routes::orders::latest))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with simulated services and an in-memory
/// checkpoint store.
pub fn create_default_state(config: &WorkerConfig) -> Result<Arc<AppState>, WorkerError> {
    let payment = InMemoryPaymentService::with_failure_rate(config.payment_failure_rate);
    let shipping = InMemoryShippingService::new();
    let notification = InMemoryNotificationService::new();
    if config.simulate_latency {
        payment.set_latency(Duration::from_millis(500));
        shipping.set_latency(Duration::from_millis(300));
        notification.set_latency(Duration::from_millis(100));
    }
    let services = FulfillmentServices::new(
        Arc::new(payment),
        Arc::new(shipping),
        Arc::new(notification),
    );

    let mut engine = OrchestratorConfig::new();
    if let Some(deadline) = config.run_deadline {
        engine = engine.with_run_deadline(deadline);
    }
    let checkpoints = InMemoryCheckpointStore::new();
    let orchestrator =
        SequenceOrchestrator::new(engine).with_checkpointer(Arc::new(checkpoints.clone()));

    let fulfillment =
        OrderFulfillment::new(orchestrator, &services, &OrderSequenceConfig::default())?;

    Ok(Arc::new(AppState {
        fulfillment,
        checkpoints,
        workers: Arc::new(Semaphore::new(config.num_workers)),
        num_workers: config.num_workers,
        shutdown: CancellationToken::new(),
    }))
}
