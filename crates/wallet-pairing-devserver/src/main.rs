#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use wallet_pairing_devserver::{AppState, DevServerConfig, SessionStore, router, spawn_janitor};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = DevServerConfig::from_env()?;
    config.validate()?;

    let app_state = AppState::new(config.clone(), Arc::new(SessionStore::new()));
    spawn_janitor(app_state.clone());

    let app = router(app_state);

    info!(
        bind = %config.bind_addr,
        session_ttl_ms = config.session_ttl_ms,
        "starting wallet-pairing devserver"
    );

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .context("failed to bind TCP listener")?;

    axum::serve(listener, app)
        .await
        .context("axum server failed")?;

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
