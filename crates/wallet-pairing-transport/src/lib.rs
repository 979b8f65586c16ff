#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod address;
pub mod error;
pub mod qr_payload;
pub mod wire;

pub use address::{format_address, validate_solana_address};
pub use error::TransportError;
pub use qr_payload::{
    QrPayloadEndpoints, QrPayloadInput, QrPayloadMetadata, QrPayloadV1, build_qr_payload,
    decode_qr_payload, encode_qr_payload, encode_qr_payload_pretty, validate_session_id,
};
pub use wire::AuthorityUrls;
