//! graphvc-api server entry point.
//!
//! Boots the HTTP API. Logs are JSON on stderr.

use anyhow::Result;
use graphvc_core::AppConfig;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

mod error;
mod identity;
mod pipeline;
mod routes;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let bind_addr = config.bind_addr.clone();
    tracing::info!(environment = %config.environment, bind_addr = %bind_addr, "starting graphvc-api");

    let state = state::AppState::from_config(config).await?;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("graphvc-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
