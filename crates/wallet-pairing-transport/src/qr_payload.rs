use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::wire::AuthorityUrls;

pub const WALLET_CONNECT_PAYLOAD_TYPE: &str = "karmacall_solana_wallet_connect";
pub const WALLET_CONNECT_PAYLOAD_VERSION: &str = "1.0";
pub const WALLET_CONNECT_PAYLOAD_MAX_BYTES: usize = 4 * 1024;
pub const SESSION_ID_MAX_LEN: usize = 128;

/// Payload scanned by the mobile wallet. Field order is the wire order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QrPayloadV1 {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub session_id: String,
    pub expires_at: u64,
    pub endpoints: QrPayloadEndpoints,
    pub challenge: Option<String>,
    pub metadata: QrPayloadMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QrPayloadEndpoints {
    pub status: String,
    pub challenge: String,
    pub verify: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QrPayloadMetadata {
    pub user_id: Option<String>,
    pub origin: String,
}

#[derive(Debug, Clone, Copy)]
pub struct QrPayloadInput<'a> {
    pub session_id: &'a str,
    pub expires_at_ms: u64,
    pub challenge: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub origin: &'a str,
    pub urls: &'a AuthorityUrls,
}

/// Session ids name files on disk, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_session_id(session_id: &str) -> Result<(), TransportError> {
    if session_id.trim().is_empty() {
        return Err(TransportError::Validation(
            "sessionId must not be empty".to_string(),
        ));
    }

    if session_id.len() > SESSION_ID_MAX_LEN {
        return Err(TransportError::Validation(format!(
            "sessionId must be at most {SESSION_ID_MAX_LEN} characters"
        )));
    }

    if !session_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(TransportError::Validation(format!(
            "sessionId '{}' contains unsupported characters",
            session_id.escape_debug()
        )));
    }

    Ok(())
}

pub fn build_qr_payload(input: QrPayloadInput<'_>) -> Result<QrPayloadV1, TransportError> {
    validate_session_id(input.session_id)?;

    if input.expires_at_ms == 0 {
        return Err(TransportError::Validation(
            "expiresAt must be greater than zero".to_string(),
        ));
    }

    if input.origin.trim().is_empty() {
        return Err(TransportError::Validation(
            "origin must not be empty".to_string(),
        ));
    }

    let endpoints = QrPayloadEndpoints {
        status: input.urls.status(input.session_id)?.to_string(),
        challenge: input.urls.challenge(input.session_id)?.to_string(),
        verify: input.urls.verify()?.to_string(),
    };

    Ok(QrPayloadV1 {
        kind: WALLET_CONNECT_PAYLOAD_TYPE.to_string(),
        version: WALLET_CONNECT_PAYLOAD_VERSION.to_string(),
        session_id: input.session_id.to_string(),
        expires_at: input.expires_at_ms,
        endpoints,
        challenge: input.challenge.map(ToString::to_string),
        metadata: QrPayloadMetadata {
            user_id: input.user_id.map(ToString::to_string),
            origin: input.origin.to_string(),
        },
    })
}

/// Compact JSON embedded in the QR image.
pub fn encode_qr_payload(payload: &QrPayloadV1) -> Result<String, TransportError> {
    validate_qr_payload(payload)?;
    Ok(serde_json::to_string(payload)?)
}

/// Indented JSON for the "copy session payload" action.
pub fn encode_qr_payload_pretty(payload: &QrPayloadV1) -> Result<String, TransportError> {
    validate_qr_payload(payload)?;
    Ok(serde_json::to_string_pretty(payload)?)
}

pub fn decode_qr_payload(encoded: &str) -> Result<QrPayloadV1, TransportError> {
    if encoded.len() > WALLET_CONNECT_PAYLOAD_MAX_BYTES {
        return Err(TransportError::Validation(format!(
            "payload exceeds {WALLET_CONNECT_PAYLOAD_MAX_BYTES} bytes",
        )));
    }

    let payload: QrPayloadV1 = serde_json::from_str(encoded).map_err(TransportError::Parse)?;
    validate_qr_payload(&payload)?;
    Ok(payload)
}

fn validate_qr_payload(payload: &QrPayloadV1) -> Result<(), TransportError> {
    if payload.kind != WALLET_CONNECT_PAYLOAD_TYPE {
        return Err(TransportError::Validation(format!(
            "payload type must be '{WALLET_CONNECT_PAYLOAD_TYPE}'; got '{}'",
            payload.kind
        )));
    }

    if payload.version != WALLET_CONNECT_PAYLOAD_VERSION {
        return Err(TransportError::Validation(format!(
            "unsupported payload version '{}'",
            payload.version
        )));
    }

    validate_session_id(&payload.session_id)
}
