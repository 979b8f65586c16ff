use thiserror::Error;
use wallet_pairing_transport::TransportError;

/// Failures talking to the session authority.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("session init failed: {0}")]
    Init(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("authority request failed with HTTP status {0}")]
    RequestFailed(u16),

    #[error("authority rejected the request: {0}")]
    Rejected(String),

    #[error("authority request timed out")]
    Timeout,

    #[error("authority request error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("failed to decode authority response: {0}")]
    Decode(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<reqwest::Error> for AuthorityError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Http(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("failed to start pairing session: {0}")]
    Init(#[source] AuthorityError),

    #[error("pairing session was superseded before it became active")]
    Superseded,

    #[error("failed to build QR payload: {0}")]
    Payload(#[from] TransportError),
}
