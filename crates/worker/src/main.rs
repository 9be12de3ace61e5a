//! Worker entry point.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::AppState;
use worker::config::{LogFormat, WorkerConfig};
use worker::error::WorkerError;

/// Waits for a shutdown signal (SIGINT or SIGTERM), then cancels running
/// orders.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }

    state.begin_shutdown();
}

fn init_tracing(config: &WorkerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let (text, json) = match config.log_format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() {
    // 1. Load configuration; a bad value is fatal
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("worker: {e}");
            std::process::exit(1);
        }
    };

    // 2. Initialize tracing
    init_tracing(&config);

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if let Err(e) = serve(config, metrics_handle).await {
        tracing::error!(error = %e, "worker failed");
        std::process::exit(1);
    }

    tracing::info!("worker shut down gracefully");
}

async fn serve(config: WorkerConfig, metrics_handle: PrometheusHandle) -> Result<(), WorkerError> {
    // 4. Build the order sequence and worker pool
    let state = worker::create_default_state(&config)?;
    let app = worker::create_app(Arc::clone(&state), metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, workers = config.num_workers, "starting worker");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;
    Ok(())
}
