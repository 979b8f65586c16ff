use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "wallet-pairing",
    version,
    about = "Link a mobile Solana wallet to a desktop session by QR code"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a pairing session, show its QR code, and wait for the wallet to confirm.
    Connect(ConnectArgs),

    /// Build a QR payload offline from known session fields and write the artifacts.
    Payload(PayloadArgs),

    /// Fetch the signing challenge for an existing session.
    Challenge(SessionArgs),

    /// Submit a signed challenge, as the mobile wallet would.
    Verify(VerifyArgs),

    /// Query the current status of a session once.
    Status(SessionArgs),

    /// Show the wallet linked to a user and its balance.
    Balance(BalanceArgs),

    /// Link a wallet address typed in by hand.
    LinkAddress(LinkAddressArgs),

    /// Fetch the message a wallet signs to link itself without a QR session.
    LinkChallenge(LinkChallengeArgs),

    /// Link a wallet with a signature over a `link-challenge` message.
    LinkWallet(LinkWalletArgs),
}

/// Overrides for `WALLET_PAIRING_*` environment settings.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Base URL of the session authority API.
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    /// Origin reported to the authority and embedded in the QR payload.
    #[arg(long = "origin")]
    pub origin: Option<String>,

    /// Initiating user id.
    #[arg(long = "user-id")]
    pub user_id: Option<String>,

    /// Fixed delay between status polls.
    #[arg(long = "poll-interval-ms")]
    pub poll_interval_ms: Option<u64>,

    /// Per-request HTTP timeout.
    #[arg(long = "request-timeout-ms")]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct ArtifactArgs {
    /// Directory for generated artifacts.
    #[arg(long = "out-dir", default_value = ".cache/wallet-pairing")]
    pub out_dir: PathBuf,

    /// Pixel scaling factor per QR module.
    #[arg(long = "pixel-per-module", default_value_t = 8_u8)]
    pub pixel_per_module: u8,
}

#[derive(Debug, Clone, Args)]
pub struct ConnectArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PayloadArgs {
    /// Session id issued by the authority.
    #[arg(long = "session-id")]
    pub session_id: String,

    /// Session expiry in epoch milliseconds.
    #[arg(long = "expires-at")]
    pub expires_at: u64,

    /// Challenge to embed; omitted means `null`.
    #[arg(long = "challenge")]
    pub challenge: Option<String>,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    #[arg(long = "session-id")]
    pub session_id: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    #[arg(long = "session-id", required_unless_present = "payload")]
    pub session_id: Option<String>,

    /// Scanned QR payload file; its session id is used.
    #[arg(long = "payload", conflicts_with = "session_id")]
    pub payload: Option<PathBuf>,

    /// Wallet public key (base58).
    #[arg(long = "public-key")]
    pub public_key: String,

    /// Signature over the challenge (base64).
    #[arg(long = "signature")]
    pub signature: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Clone, Args)]
pub struct BalanceArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LinkAddressArgs {
    /// Solana address to link.
    #[arg(long = "address")]
    pub address: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LinkChallengeArgs {
    /// Wallet public key (base58).
    #[arg(long = "public-key")]
    pub public_key: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LinkWalletArgs {
    /// Wallet public key (base58).
    #[arg(long = "public-key")]
    pub public_key: String,

    /// Signature over the challenge message (base64).
    #[arg(long = "signature")]
    pub signature: String,

    /// Challenge message exactly as returned by `link-challenge`.
    #[arg(long = "message")]
    pub message: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}
