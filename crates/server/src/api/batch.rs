//! Batch API handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use clipline_core::{BatchError, BatchRequest, BatchResponse};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics::BATCH_REQUESTS_REJECTED;
use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct BatchErrorResponse {
    pub error: String,
}

fn rejected(status: StatusCode, reason: &str, error: String) -> (StatusCode, Json<BatchErrorResponse>) {
    BATCH_REQUESTS_REJECTED.with_label_values(&[reason]).inc();
    (status, Json(BatchErrorResponse { error }))
}

/// Run a batch to completion and return its order-preserving results.
///
/// Invalid input is rejected with 400 before anything is scheduled. Job
/// failures are reported inside a 200 response, one result per item.
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, impl IntoResponse> {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return Err(rejected(
                StatusCode::BAD_REQUEST,
                "malformed",
                rejection.body_text(),
            ))
        }
    };

    info!(items = request.items.len(), max_concurrency = ?request.max_concurrency, "Batch submitted");
    match state.batches().submit(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e @ BatchError::Validation(_)) => {
            warn!(error = %e, "Batch rejected");
            Err(rejected(StatusCode::BAD_REQUEST, "validation", e.to_string()))
        }
        Err(e) => Err(rejected(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            e.to_string(),
        )),
    }
}
