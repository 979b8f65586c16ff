#![warn(clippy::all, clippy::pedantic)]

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wallet_pairing::cli::Cli;

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    wallet_pairing::run(cli)
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
