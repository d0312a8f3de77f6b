//! `GET /usage`.

use crate::error::ApiError;
use crate::identity::{self, ClientIp, MaybeUser};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use graphvc_core::Usage;

/// Report quota state for the caller without consuming a request.
pub async fn usage(
    State(state): State<AppState>, ClientIp(ip): ClientIp, MaybeUser(claims): MaybeUser,
) -> Result<Json<Usage>, ApiError> {
    let (key, tier) = identity::quota_key(claims.as_ref(), ip);
    Ok(Json(state.limiter.peek(&key, tier).await?))
}
