#![warn(clippy::all, clippy::pedantic)]

pub mod account;
pub mod authority;
pub mod cli;
pub mod clock;
pub mod config;
pub mod connect;
pub mod coordinator;
pub mod error;
pub mod qr;
pub mod session;

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::runtime::Builder;
use tracing::warn;
use wallet_pairing_transport::wire::VerifyRequest;
use wallet_pairing_transport::{
    QrPayloadInput, QrPayloadV1, build_qr_payload, decode_qr_payload, format_address,
    validate_session_id, validate_solana_address,
};

use crate::account::describe_balance;
use crate::authority::{HttpAuthority, SessionAuthority};
use crate::cli::{
    ArtifactArgs, BalanceArgs, Cli, Command, ConnectArgs, LinkAddressArgs, LinkChallengeArgs,
    LinkWalletArgs, PayloadArgs, SessionArgs, VerifyArgs,
};
use crate::config::PairingConfig;
use crate::connect::{ConnectRunInput, run_connect};
use crate::qr::render_payload_artifacts;

pub use crate::authority::CreatedSession;
pub use crate::coordinator::{CoordinatorConfig, PollingCoordinator, TimerState};
pub use crate::error::{AuthorityError, PairingError};
pub use crate::session::{PairingStatus, SessionSnapshot};

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Connect(args) => run_connect_command(args),
        Command::Payload(args) => run_payload(&args),
        Command::Challenge(args) => run_challenge(&args),
        Command::Verify(args) => run_verify(&args),
        Command::Status(args) => run_status(&args),
        Command::Balance(args) => run_balance(&args),
        Command::LinkAddress(args) => run_link_address(&args),
        Command::LinkChallenge(args) => run_link_challenge(&args),
        Command::LinkWallet(args) => run_link_wallet(&args),
    }
}

fn run_connect_command(args: ConnectArgs) -> Result<()> {
    let config = PairingConfig::resolve(&args.connection)?;
    run_connect(ConnectRunInput {
        config,
        artifacts: args.artifacts,
    })
}

fn run_payload(args: &PayloadArgs) -> Result<()> {
    let config = PairingConfig::resolve(&args.connection)?;
    let urls = config.authority_urls()?;

    let payload = build_qr_payload(QrPayloadInput {
        session_id: &args.session_id,
        expires_at_ms: args.expires_at,
        challenge: args.challenge.as_deref(),
        user_id: config.user_id.as_deref(),
        origin: &config.origin,
        urls: &urls,
    })?;

    emit_payload_artifacts(&args.artifacts, &payload)
}

fn run_challenge(args: &SessionArgs) -> Result<()> {
    let authority = http_authority(&args.connection)?.1;
    let challenge = block_on(authority.fetch_challenge(&args.session_id))?
        .context("authority has not issued a challenge for this session")?;

    println!("session_id: {}", args.session_id);
    println!("challenge: {challenge}");
    Ok(())
}

fn run_verify(args: &VerifyArgs) -> Result<()> {
    validate_solana_address(&args.public_key)?;
    let scanned = args.payload.as_deref().map(read_payload_file).transpose()?;
    let authority = http_authority(&args.connection)?.1;

    let session_id = match (&scanned, &args.session_id) {
        (Some(payload), _) => {
            let configured = authority.urls().verify()?;
            if payload.endpoints.verify != configured.as_str() {
                warn!(
                    payload_verify = %payload.endpoints.verify,
                    %configured,
                    "payload was issued by a different authority"
                );
            }
            payload.session_id.clone()
        }
        (None, Some(session_id)) => session_id.clone(),
        (None, None) => bail!("either --session-id or --payload is required"),
    };

    let verified = block_on(authority.verify_session(&VerifyRequest {
        session_id: session_id.clone(),
        public_key: args.public_key.clone(),
        signature: args.signature.clone(),
    }))
    .with_context(|| format!("failed to verify session '{session_id}'"))?;

    println!("session_id: {session_id}");
    println!("verified: {}", verified.success);
    if let Some(message) = verified.message {
        println!("message: {message}");
    }
    Ok(())
}

fn run_status(args: &SessionArgs) -> Result<()> {
    let authority = http_authority(&args.connection)?.1;
    let status = block_on(authority.poll_status(&args.session_id))
        .with_context(|| format!("failed to query session '{}'", args.session_id))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&status).context("failed to format status json")?
    );
    Ok(())
}

fn run_balance(args: &BalanceArgs) -> Result<()> {
    let (config, authority) = http_authority(&args.connection)?;
    let user_id = config.require_user_id()?;

    let balance = block_on(authority.wallet_balance(user_id))
        .with_context(|| format!("failed to fetch balance for user '{user_id}'"))?;

    println!("user_id: {user_id}");
    println!("wallet: {}", describe_balance(&balance));
    Ok(())
}

fn run_link_address(args: &LinkAddressArgs) -> Result<()> {
    validate_solana_address(&args.address)?;
    let (config, authority) = http_authority(&args.connection)?;
    let user_id = config.require_user_id()?;

    let linked = block_on(authority.link_address(user_id, &args.address))
        .with_context(|| format!("failed to link wallet for user '{user_id}'"))?;

    println!("linked_wallet: {}", format_address(&args.address));
    if let Some(message) = linked.message {
        println!("message: {message}");
    }
    Ok(())
}

fn run_link_challenge(args: &LinkChallengeArgs) -> Result<()> {
    validate_solana_address(&args.public_key)?;
    let authority = http_authority(&args.connection)?.1;

    let message = block_on(authority.generate_link_challenge(&args.public_key))
        .with_context(|| format!("failed to generate challenge for '{}'", args.public_key))?;

    println!("public_key: {}", args.public_key);
    println!("message:\n{message}");
    Ok(())
}

fn run_link_wallet(args: &LinkWalletArgs) -> Result<()> {
    validate_solana_address(&args.public_key)?;
    let (config, authority) = http_authority(&args.connection)?;
    let user_id = config.require_user_id()?;

    let linked = block_on(authority.link_signed_wallet(
        user_id,
        &args.public_key,
        &args.signature,
        &args.message,
    ))
    .with_context(|| format!("failed to link wallet for user '{user_id}'"))?;

    println!("linked_wallet: {}", format_address(&args.public_key));
    if let Some(message) = linked.message {
        println!("message: {message}");
    }
    Ok(())
}

fn read_payload_file(path: &Path) -> Result<QrPayloadV1> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read payload file '{}'", path.display()))?;
    decode_qr_payload(raw.trim())
        .with_context(|| format!("invalid payload file '{}'", path.display()))
}

fn http_authority(connection: &cli::ConnectionArgs) -> Result<(PairingConfig, HttpAuthority)> {
    let config = PairingConfig::resolve(connection)?;
    let authority = HttpAuthority::new(config.authority_urls()?, config.request_timeout())
        .context("failed to build authority client")?;
    Ok((config, authority))
}

fn block_on<T, E>(future: impl Future<Output = Result<T, E>>) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    Ok(runtime.block_on(future)?)
}

pub(crate) fn emit_payload_artifacts(args: &ArtifactArgs, payload: &QrPayloadV1) -> Result<()> {
    validate_session_id(&payload.session_id)?;
    let artifacts = render_payload_artifacts(payload, args.pixel_per_module)?;

    fs::create_dir_all(&args.out_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            args.out_dir.display()
        )
    })?;

    let (payload_path, qr_png_path) = artifact_paths(&args.out_dir, &payload.session_id);

    write_text_file(&payload_path, format!("{}\n", artifacts.payload_json_pretty))?;
    write_binary_file(&qr_png_path, &artifacts.qr_png)?;

    println!("session_id: {}", payload.session_id);
    println!("expires_at: {}", payload.expires_at);
    println!("payload_json: {}", artifacts.payload_json);
    println!("payload_length: {}", artifacts.payload_json.len());
    println!("payload_file: {}", payload_path.display());
    println!("qr_png: {}", qr_png_path.display());
    println!("qr_text:\n{}", artifacts.qr_text);

    Ok(())
}

#[must_use]
pub fn artifact_paths(out_dir: &Path, session_id: &str) -> (PathBuf, PathBuf) {
    (
        out_dir.join(format!("{session_id}.qr_payload.json")),
        out_dir.join(format!("{session_id}.qr.png")),
    )
}

fn write_text_file(path: &Path, content: String) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write '{}'", path.display()))
}

fn write_binary_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write '{}'", path.display()))
}
