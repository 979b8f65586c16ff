use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid Solana address: {0}")]
    InvalidAddress(String),

    #[error("invalid authority URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to parse payload json: {0}")]
    Parse(#[source] serde_json::Error),
}
