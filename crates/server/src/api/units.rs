//! Unit record API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use clipline_core::{retitle_unit, StoreError, UnitRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::metrics::UNIT_RENAMES;
use crate::state::AppState;

/// Request body for retitling a unit
#[derive(Debug, Deserialize)]
pub struct RetitleBody {
    pub title: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct UnitErrorResponse {
    pub error: String,
}

fn status_for(error: &StoreError) -> (StatusCode, &'static str) {
    match error {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        StoreError::AlreadyExists { .. } => (StatusCode::CONFLICT, "conflict"),
        StoreError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "invalid"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "failed"),
    }
}

/// Change a unit's title, moving its record, clip and artifacts together.
pub async fn retitle(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<RetitleBody>,
) -> Result<Json<UnitRecord>, impl IntoResponse> {
    if body.title.trim().is_empty() {
        UNIT_RENAMES.with_label_values(&["invalid"]).inc();
        return Err((
            StatusCode::BAD_REQUEST,
            Json(UnitErrorResponse {
                error: "title must not be empty".to_string(),
            }),
        ));
    }

    match retitle_unit(state.store(), &name, &body.title).await {
        Ok(record) => {
            UNIT_RENAMES.with_label_values(&["renamed"]).inc();
            info!(old_name = %name, new_name = %record.name, "Unit retitled");
            Ok(Json(record))
        }
        Err(e) => {
            let (status, result) = status_for(&e);
            UNIT_RENAMES.with_label_values(&[result]).inc();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(name = %name, error = %e, "Unit retitle failed");
            }
            Err((status, Json(UnitErrorResponse { error: e.to_string() })))
        }
    }
}
