//! `POST /generate`.

use crate::error::ApiError;
use crate::identity::{self, Byok, Caller, ClientIp};
use crate::pipeline::{self, GenerateRequest, GenerateResponse};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use graphvc_core::{Decision, Error};

const LIMIT_REACHED: &str = "Daily limit reached";

/// Generate a knowledge graph from a URL or pasted text.
///
/// Callers bringing their own OpenAI key skip the quota check.
pub async fn generate(
    State(state): State<AppState>, ClientIp(ip): ClientIp, Caller(claims): Caller, Byok(byok): Byok,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = body?;

    if byok.is_none() {
        let (key, tier) = identity::quota_key(claims.as_ref(), ip);
        if let Decision::Deny { retry_after } = state.limiter.check(&key, tier).await? {
            tracing::info!(tier = tier.as_str(), retry_after, "quota exhausted");
            return Err(Error::RateLimited { retry_after: Some(retry_after), message: LIMIT_REACHED.into() }.into());
        }
    }

    let response = pipeline::run(&state, &request, claims.as_ref(), byok.as_deref()).await?;
    Ok(Json(response))
}
