use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use logos_api::app::{router, AppState, Components};
use logos_api::config;
use logos_api::services::wait_for_shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(config::config().clone());
    tracing::info!("Starting Logos API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; bearer tokens will be rejected");
    }

    let components = Components::connect(&config).await?;
    let lifecycle = components.lifecycle(Duration::from_secs(config.api.shutdown_timeout));
    let state = AppState::new(
        config.clone(),
        components.provisioner.clone(),
        components.audit.clone(),
        components.members.clone(),
    );

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Logos API listening on http://{}", bind_addr);

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await;

    lifecycle.shutdown().await;
    served.context("server error")?;
    Ok(())
}
