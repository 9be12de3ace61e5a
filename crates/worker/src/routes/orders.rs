//! Order submission and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::Order;
use fulfillment::OrderResult;

use crate::AppState;
use crate::error::ApiError;

/// POST /orders: run an order through the fulfillment sequence.
///
/// Responds `200` when the order completed, `422` when a required step
/// failed and `503` when the run was cancelled by shutdown. The body is the
/// order result in every case.
#[tracing::instrument(skip(state, order), fields(order_id = %order.order_id))]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(order): Json<Order>,
) -> Result<(StatusCode, Json<OrderResult>), ApiError> {
    let permit = Arc::clone(&state.workers)
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Unavailable("worker is shutting down".to_string()))?;
    metrics::gauge!("order_runs_in_flight").set(state.in_flight() as f64);

    // The run lives on its own task so a dropped connection cannot abandon
    // it between steps.
    let fulfillment = state.fulfillment.clone();
    let cancel = state.shutdown.child_token();
    let run = tokio::spawn(async move {
        let outcome = fulfillment.run_order_sequence_with(&order, cancel).await;
        drop(permit);
        outcome
    });

    let joined = run.await;
    metrics::gauge!("order_runs_in_flight").set(state.in_flight() as f64);

    match joined {
        Ok(Ok(result)) => Ok((StatusCode::OK, Json(result))),
        Ok(Err(failure)) if failure.is_cancelled() => {
            Ok((StatusCode::SERVICE_UNAVAILABLE, Json(failure.result)))
        }
        Ok(Err(failure)) => Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(failure.result))),
        Err(e) => Err(ApiError::Internal(format!("order run aborted: {e}"))),
    }
}

/// GET /orders/{id}: latest checkpointed result for an order.
#[tracing::instrument(skip(state))]
pub async fn latest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResult>, ApiError> {
    let checkpoint = state
        .checkpoints
        .latest_for_subject(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResult::from_aggregated(&checkpoint)))
}
