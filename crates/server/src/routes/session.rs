//! `GET /generate/session/{id}`.

use crate::error::ApiError;
use crate::identity::{self, MaybeUser};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use graphvc_core::graph::can_read;
use graphvc_core::{Error, KnowledgeGraph};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub graph: KnowledgeGraph,
}

/// Return a previously generated graph.
///
/// A graph owned by someone else answers exactly like a missing one.
pub async fn session(
    State(state): State<AppState>, MaybeUser(claims): MaybeUser, Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let caller = identity::owner(claims.as_ref());

    let stored = state
        .graphs
        .load(&id)
        .await?
        .filter(|stored| can_read(&stored.owner, caller, state.config.legacy_dev_owner_public))
        .ok_or_else(|| Error::NotFound("Graph not found".into()))?;

    Ok(Json(SessionResponse { session_id: id, graph: stored.graph }))
}
