use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::runtime::Builder;
use tracing::debug;
use wallet_pairing_transport::format_address;

use crate::authority::{HttpAuthority, SessionAuthority};
use crate::cli::ArtifactArgs;
use crate::clock::Clock;
use crate::config::PairingConfig;
use crate::coordinator::PollingCoordinator;
use crate::emit_payload_artifacts;
use crate::session::{PairingStatus, SessionSnapshot};

#[derive(Debug, Clone)]
pub struct ConnectRunInput {
    pub config: PairingConfig,
    pub artifacts: ArtifactArgs,
}

pub fn run_connect(input: ConnectRunInput) -> Result<()> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    runtime.block_on(run_connect_async(input))
}

async fn run_connect_async(input: ConnectRunInput) -> Result<()> {
    let authority = HttpAuthority::new(input.config.authority_urls()?, input.config.request_timeout())
        .context("failed to build authority client")?;
    let authority: Arc<dyn SessionAuthority> = Arc::new(authority);

    let coordinator = PollingCoordinator::new(
        authority,
        input.config.coordinator_config()?,
        Clock::system(),
    );
    let mut updates = coordinator.subscribe();

    let started = coordinator
        .start_session()
        .await
        .context("failed to start pairing session")?;
    let Some(payload) = &started.qr_payload else {
        bail!("pairing session started without a QR payload");
    };

    emit_payload_artifacts(&input.artifacts, payload)?;
    println!("status: {} ({})", started.status, started.status_message);
    println!("waiting_for_wallet: true");

    let mut last = started;
    updates.mark_unchanged();

    let finished = loop {
        updates
            .changed()
            .await
            .context("pairing coordinator stopped unexpectedly")?;
        let snapshot = updates.borrow_and_update().clone();
        print_changes(&last, &snapshot);

        if snapshot.status.is_terminal() {
            break snapshot;
        }
        last = snapshot;
    };

    if finished.status != PairingStatus::Confirmed {
        bail!(
            "pairing ended with status {}: {}",
            finished.status,
            finished.status_message
        );
    }

    match finished.linked_public_key.as_deref() {
        Some(public_key) => println!("linked_wallet: {}", format_address(public_key)),
        None => println!("linked_wallet: unknown"),
    }

    Ok(())
}

fn print_changes(previous: &SessionSnapshot, current: &SessionSnapshot) {
    if previous.status != current.status || previous.status_message != current.status_message {
        println!("status: {} ({})", current.status, current.status_message);
    }

    if previous.countdown != current.countdown {
        debug!(countdown = %current.countdown, "countdown");
        println!("countdown: {}", current.countdown);
    }
}
