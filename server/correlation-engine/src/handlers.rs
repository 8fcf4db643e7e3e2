//! HTTP handlers for the correlation engine service.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::error;

use crate::error::EngineError;
use crate::state::AppState;
use crate::types::{ErrorBody, IngestPayload};

pub async fn health() -> &'static str {
  "ok"
}

/// POST /api/v1/logs: ingest one event, 201 with the persisted event.
///
/// Validation failures are the caller's problem (400); store failures are
/// ours (500). Incident creation and enrichment never affect this response.
pub async fn ingest(
  State(state): State<Arc<AppState>>,
  Json(payload): Json<IngestPayload>,
) -> impl IntoResponse {
  match state.engine.ingest(payload).await {
    Ok(event) => (StatusCode::CREATED, Json(event)).into_response(),
    Err(e @ EngineError::Validation { .. }) => {
      (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response()
    }
    Err(e) => {
      error!("ingest failed: {e}");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Internal Server Error")),
      )
        .into_response()
    }
  }
}
