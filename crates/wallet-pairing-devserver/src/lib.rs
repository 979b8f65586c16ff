#![warn(clippy::all, clippy::pedantic)]

pub mod challenge;
pub mod config;
pub mod http;
pub mod state_machine;
pub mod store;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ring::rand::SystemRandom;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::info;

pub use crate::config::DevServerConfig;
pub use crate::http::router;
pub use crate::store::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: DevServerConfig,
    pub store: Arc<SessionStore>,
    pub rng: SystemRandom,
}

impl AppState {
    #[must_use]
    pub fn new(config: DevServerConfig, store: Arc<SessionStore>) -> Self {
        Self {
            config,
            store,
            rng: SystemRandom::new(),
        }
    }
}

pub fn spawn_janitor(app_state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(Duration::from_millis(app_state.config.janitor_interval_ms)).await;
            run_janitor_pass(&app_state, now_ms());
        }
    })
}

/// Expires overdue pending sessions, then drops finished ones past retention.
pub fn run_janitor_pass(app_state: &AppState, now: u64) {
    for session_id in app_state.store.expire_sessions(now) {
        info!(%session_id, "pairing session expired");
    }

    let prune_before = now.saturating_sub(app_state.config.session_retention_ms);
    let pruned = app_state.store.prune_sessions(prune_before);
    if pruned > 0 {
        info!(count = pruned, "pruned finished pairing sessions");
    }
}

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().try_into().unwrap_or(u64::MAX))
        .unwrap_or_default()
}
