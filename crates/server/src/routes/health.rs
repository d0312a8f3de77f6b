//! `GET /health`.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use graphvc_core::Error;
use serde_json::{Value, json};

/// Liveness of the graph store connection.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.graphs.ping().await.map_err(|e| {
        tracing::error!(error = %e, "graph store health check failed");
        Error::ServiceUnavailable("Graph database unavailable".into())
    })?;
    Ok(Json(json!({ "status": "ok" })))
}
