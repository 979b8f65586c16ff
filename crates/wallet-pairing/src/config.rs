use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;
use wallet_pairing_transport::AuthorityUrls;

use crate::cli::ConnectionArgs;
use crate::coordinator::CoordinatorConfig;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8788/api/";
const DEFAULT_ORIGIN: &str = "https://www.karmacall.com";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingConfig {
    pub api_url: String,
    pub origin: String,
    pub user_id: Option<String>,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            user_id: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl PairingConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: env_var_or_default("WALLET_PAIRING_API_URL", DEFAULT_API_URL),
            origin: env_var_or_default("WALLET_PAIRING_ORIGIN", DEFAULT_ORIGIN),
            user_id: optional_env_var("WALLET_PAIRING_USER_ID"),
            poll_interval_ms: parse_u64_env(
                "WALLET_PAIRING_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )?,
            request_timeout_ms: parse_u64_env(
                "WALLET_PAIRING_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?,
        })
    }

    /// Environment first, then explicit command-line values on top.
    pub fn resolve(args: &ConnectionArgs) -> Result<Self> {
        let mut config = Self::from_env()?;
        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, args: &ConnectionArgs) {
        if let Some(api_url) = &args.api_url {
            self.api_url.clone_from(api_url);
        }
        if let Some(origin) = &args.origin {
            self.origin.clone_from(origin);
        }
        if let Some(user_id) = &args.user_id {
            self.user_id = Some(user_id.clone());
        }
        if let Some(poll_interval_ms) = args.poll_interval_ms {
            self.poll_interval_ms = poll_interval_ms;
        }
        if let Some(request_timeout_ms) = args.request_timeout_ms {
            self.request_timeout_ms = request_timeout_ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let api_url =
            Url::parse(&self.api_url).with_context(|| "WALLET_PAIRING_API_URL must be a valid URL")?;

        let Some(host) = api_url.host_str() else {
            bail!("WALLET_PAIRING_API_URL must include a host");
        };

        match api_url.scheme() {
            "http" => {
                if !is_local_or_private_host(host) {
                    bail!(
                        "http:// is only allowed for local/private hosts; use https:// for non-local hosts"
                    );
                }
            }
            "https" => {}
            other => bail!("WALLET_PAIRING_API_URL scheme must be http or https; got '{other}'"),
        }

        if self.origin.trim().is_empty() {
            bail!("WALLET_PAIRING_ORIGIN must not be empty");
        }

        if self.poll_interval_ms == 0 {
            bail!("WALLET_PAIRING_POLL_INTERVAL_MS must be > 0");
        }

        if self.request_timeout_ms == 0 {
            bail!("WALLET_PAIRING_REQUEST_TIMEOUT_MS must be > 0");
        }

        Ok(())
    }

    pub fn authority_urls(&self) -> Result<AuthorityUrls> {
        AuthorityUrls::parse(&self.api_url)
            .with_context(|| format!("invalid authority URL '{}'", self.api_url))
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn coordinator_config(&self) -> Result<CoordinatorConfig> {
        let mut config =
            CoordinatorConfig::new(self.authority_urls()?, self.origin.clone(), self.user_id.clone());
        config.poll_interval = self.poll_interval();
        Ok(config)
    }

    pub fn require_user_id(&self) -> Result<&str> {
        match self.user_id.as_deref() {
            Some(user_id) if !user_id.trim().is_empty() => Ok(user_id),
            _ => bail!("a user id is required; pass --user-id or set WALLET_PAIRING_USER_ID"),
        }
    }
}

fn env_var_or_default(key: &str, default_value: &str) -> String {
    optional_env_var(key).unwrap_or_else(|| default_value.to_string())
}

fn optional_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64_env(key: &str, default_value: u64) -> Result<u64> {
    let raw = env_var_or_default(key, &default_value.to_string());
    u64::from_str(&raw).with_context(|| format!("{key} must be a valid u64 integer"))
}

fn is_local_or_private_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".local") {
        return true;
    }

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let Ok(ip) = host.parse::<IpAddr>() else {
        return false;
    };

    match ip {
        IpAddr::V4(ipv4) => is_private_ipv4(ipv4),
        IpAddr::V6(ipv6) => ipv6.is_loopback() || ipv6.is_unique_local(),
    }
}

const fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.octets()[0] == 100 && (ip.octets()[1] & 0b1100_0000) == 0b0100_0000
}
