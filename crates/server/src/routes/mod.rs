//! HTTP routes.

pub mod generate;
pub mod health;
pub mod session;
pub mod usage;


use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/generate", post(generate::generate))
        .route("/generate/session/{id}", get(session::session))
        .route("/usage", get(usage::usage))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
