use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8788";

pub const DEFAULT_SESSION_TTL_MS: u64 = 120_000;
pub const MAX_SESSION_TTL_MS: u64 = 600_000;

#[derive(Debug, Clone)]
pub struct DevServerConfig {
    pub bind_addr: SocketAddr,
    pub session_ttl_ms: u64,
    pub janitor_interval_ms: u64,
    /// Finished or expired sessions older than this are dropped.
    pub session_retention_ms: u64,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8788)),
            session_ttl_ms: DEFAULT_SESSION_TTL_MS,
            janitor_interval_ms: 5_000,
            session_retention_ms: 600_000,
        }
    }
}

impl DevServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env_var_or_default("WALLET_PAIRING_DEVSERVER_BIND_ADDR", DEFAULT_BIND_ADDR)
                .parse::<SocketAddr>()
                .with_context(
                    || "WALLET_PAIRING_DEVSERVER_BIND_ADDR must be a valid host:port socket address",
                )?;

        let session_ttl_ms =
            parse_u64_env("WALLET_PAIRING_DEVSERVER_SESSION_TTL_MS", DEFAULT_SESSION_TTL_MS)?;
        let janitor_interval_ms =
            parse_u64_env("WALLET_PAIRING_DEVSERVER_JANITOR_INTERVAL_MS", 5_000)?;
        let session_retention_ms =
            parse_u64_env("WALLET_PAIRING_DEVSERVER_SESSION_RETENTION_MS", 600_000)?;

        Ok(Self {
            bind_addr,
            session_ttl_ms,
            janitor_interval_ms,
            session_retention_ms,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_ms == 0 || self.session_ttl_ms > MAX_SESSION_TTL_MS {
            bail!("WALLET_PAIRING_DEVSERVER_SESSION_TTL_MS must be in 1..={MAX_SESSION_TTL_MS}");
        }

        if self.janitor_interval_ms == 0 {
            bail!("WALLET_PAIRING_DEVSERVER_JANITOR_INTERVAL_MS must be > 0");
        }

        if self.session_retention_ms == 0 {
            bail!("WALLET_PAIRING_DEVSERVER_SESSION_RETENTION_MS must be > 0");
        }

        if !self.bind_addr.ip().is_loopback() {
            tracing::warn!(
                bind = %self.bind_addr,
                "devserver bound to a non-loopback address; it performs no signature verification"
            );
        }

        Ok(())
    }
}

fn env_var_or_default(key: &str, default_value: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_value.to_string())
}

fn parse_u64_env(key: &str, default_value: u64) -> Result<u64> {
    let raw = env_var_or_default(key, &default_value.to_string());
    u64::from_str(&raw).with_context(|| format!("{key} must be a valid u64 integer"))
}
