use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TransportError;

pub const SOLANA_QR_INIT_ENDPOINT: &str = "solana/qr-init";
pub const SOLANA_QR_CHALLENGE_ENDPOINT: &str = "solana/qr-challenge";
pub const SOLANA_QR_STATUS_ENDPOINT: &str = "solana/qr-status";
pub const SOLANA_QR_VERIFY_ENDPOINT: &str = "solana/qr-verify";
pub const SOLANA_BALANCE_ENDPOINT: &str = "solana/balance";
pub const SOLANA_CONNECT_WALLET_ENDPOINT: &str = "solana/connectWallet";
pub const SOLANA_GENERATE_CHALLENGE_ENDPOINT: &str = "solana/generateChallenge";

pub const SESSION_ID_QUERY_PARAM: &str = "sessionId";
pub const USER_ID_QUERY_PARAM: &str = "userId";
pub const PUBLIC_KEY_QUERY_PARAM: &str = "publicKey";

/// Signature placeholder the authority recognizes for addresses typed in by hand.
pub const MANUAL_ENTRY_SIGNATURE: &str = "manual_entry";
pub const MANUAL_ENTRY_MESSAGE: &str = "Manual wallet entry";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChallengeResponse {
    /// Older authority builds return the challenge text in `message`.
    #[must_use]
    pub fn into_challenge(self) -> Option<String> {
        if !self.success {
            return None;
        }

        self.challenge
            .filter(|value| !value.is_empty())
            .or_else(|| self.message.filter(|value| !value.is_empty()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Expired,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub session_id: String,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    #[serde(default)]
    pub has_wallet: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWalletRequest {
    pub user_id: String,
    pub public_key: String,
    pub signature: String,
    pub message: String,
}

impl ConnectWalletRequest {
    /// Link backed by a signature over a message from `generateChallenge`.
    #[must_use]
    pub fn signed(user_id: &str, public_key: &str, signature: &str, message: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            public_key: public_key.to_string(),
            signature: signature.to_string(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn manual_entry(user_id: &str, address: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            public_key: address.to_string(),
            signature: MANUAL_ENTRY_SIGNATURE.to_string(),
            message: MANUAL_ENTRY_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWalletResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answer to `GET solana/generateChallenge?publicKey=...`; `message` is the text to sign.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkChallengeResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Body shape the authority uses for non-2xx answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    #[must_use]
    pub fn into_detail(self) -> Option<String> {
        self.message.or(self.error)
    }
}

/// Absolute endpoint URLs resolved against the authority base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityUrls {
    base: Url,
}

impl AuthorityUrls {
    pub fn parse(base: &str) -> Result<Self, TransportError> {
        let trimmed = base.trim();
        if trimmed.is_empty() {
            return Err(TransportError::Validation(
                "authority URL must not be empty".to_string(),
            ));
        }

        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };

        let base = Url::parse(&normalized).map_err(|source| TransportError::InvalidUrl {
            url: trimmed.to_string(),
            source,
        })?;

        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TransportError::Validation(format!(
                    "authority URL scheme must be http or https; got '{other}'"
                )));
            }
        }

        if base.host_str().is_none() {
            return Err(TransportError::Validation(
                "authority URL must include a host".to_string(),
            ));
        }

        Ok(Self { base })
    }

    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    pub fn endpoint(&self, endpoint: &str) -> Result<Url, TransportError> {
        self.base
            .join(endpoint.trim_start_matches('/'))
            .map_err(|source| TransportError::InvalidUrl {
                url: format!("{}{endpoint}", self.base),
                source,
            })
    }

    pub fn init(&self) -> Result<Url, TransportError> {
        self.endpoint(SOLANA_QR_INIT_ENDPOINT)
    }

    pub fn challenge(&self, session_id: &str) -> Result<Url, TransportError> {
        self.with_query(
            SOLANA_QR_CHALLENGE_ENDPOINT,
            SESSION_ID_QUERY_PARAM,
            session_id,
        )
    }

    pub fn status(&self, session_id: &str) -> Result<Url, TransportError> {
        self.with_query(SOLANA_QR_STATUS_ENDPOINT, SESSION_ID_QUERY_PARAM, session_id)
    }

    pub fn verify(&self) -> Result<Url, TransportError> {
        self.endpoint(SOLANA_QR_VERIFY_ENDPOINT)
    }

    pub fn balance(&self, user_id: &str) -> Result<Url, TransportError> {
        self.with_query(SOLANA_BALANCE_ENDPOINT, USER_ID_QUERY_PARAM, user_id)
    }

    pub fn connect_wallet(&self) -> Result<Url, TransportError> {
        self.endpoint(SOLANA_CONNECT_WALLET_ENDPOINT)
    }

    pub fn generate_challenge(&self, public_key: &str) -> Result<Url, TransportError> {
        self.with_query(
            SOLANA_GENERATE_CHALLENGE_ENDPOINT,
            PUBLIC_KEY_QUERY_PARAM,
            public_key,
        )
    }

    fn with_query(&self, endpoint: &str, key: &str, value: &str) -> Result<Url, TransportError> {
        let mut url = self.endpoint(endpoint)?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_without_trailing_slash_keeps_path_prefix() {
        let urls = AuthorityUrls::parse("https://api.karmacall.com/api").expect("parse");

        assert_eq!(
            urls.init().expect("init url").as_str(),
            "https://api.karmacall.com/api/solana/qr-init"
        );
        assert_eq!(
            urls.status("abc123").expect("status url").as_str(),
            "https://api.karmacall.com/api/solana/qr-status?sessionId=abc123"
        );
    }

    #[test]
    fn query_values_are_form_encoded() {
        let urls = AuthorityUrls::parse("http://127.0.0.1:8788/api/").expect("parse");
        let url = urls.balance("user id&x").expect("balance url");

        assert_eq!(url.query(), Some("userId=user+id%26x"));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = AuthorityUrls::parse("ws://127.0.0.1/api/").expect_err("must reject ws");
        assert!(err.to_string().contains("must be http or https"));
    }

    #[test]
    fn unknown_status_string_decodes_as_unknown() {
        let response: StatusResponse =
            serde_json::from_str(r#"{"status":"verifying","message":"hold on"}"#)
                .expect("decode status");

        assert_eq!(response.status, SessionStatus::Unknown);
        assert_eq!(response.message.as_deref(), Some("hold on"));
        assert!(response.public_key.is_none());
    }

    #[test]
    fn challenge_falls_back_to_message_field() {
        let response: ChallengeResponse =
            serde_json::from_str(r#"{"success":true,"message":"sign me"}"#).expect("decode");
        assert_eq!(response.into_challenge().as_deref(), Some("sign me"));

        let failed: ChallengeResponse =
            serde_json::from_str(r#"{"success":false,"message":"no challenge yet"}"#)
                .expect("decode");
        assert!(failed.into_challenge().is_none());
    }

    #[test]
    fn link_challenge_url_carries_public_key() {
        let urls = AuthorityUrls::parse("https://api.karmacall.com/api").expect("parse");

        assert_eq!(
            urls.generate_challenge("9xQe").expect("url").as_str(),
            "https://api.karmacall.com/api/solana/generateChallenge?publicKey=9xQe"
        );
    }

    #[test]
    fn link_challenge_without_success_flag_decodes_as_success() {
        let response: LinkChallengeResponse =
            serde_json::from_str(r#"{"message":"sign me"}"#).expect("decode");

        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("sign me"));
    }

    #[test]
    fn manual_entry_request_uses_placeholder_signature() {
        let request = ConnectWalletRequest::manual_entry("user-1", "addr");
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["signature"], MANUAL_ENTRY_SIGNATURE);
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["publicKey"], "addr");
    }
}
