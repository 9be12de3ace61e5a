//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub workers: usize,
    pub in_flight: usize,
}

/// GET /health: reports liveness and pool usage.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.shutdown.is_cancelled() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status,
        workers: state.num_workers,
        in_flight: state.in_flight(),
    })
}
