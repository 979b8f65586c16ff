use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

pub const CHALLENGE_NONCE_BYTES: usize = 32;
pub const ED25519_SIGNATURE_BYTES: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("failed to generate random challenge")]
    Random,

    #[error("signature must be base64 or base58")]
    SignatureEncoding,

    #[error("signature must decode to {ED25519_SIGNATURE_BYTES} bytes; got {0}")]
    SignatureLength(usize),
}

const CHALLENGE_PREFIX: &str = "Sign this message to link your wallet to KarmaCall.";

/// Message the wallet signs for a QR session: the session id and a random nonce.
pub fn generate_challenge(rng: &SystemRandom, session_id: &str) -> Result<String, ChallengeError> {
    Ok(format!(
        "{CHALLENGE_PREFIX}\nSession: {session_id}\nNonce: {}",
        random_nonce(rng)?
    ))
}

/// Message for linking a wallet directly, bound to its public key.
pub fn generate_link_challenge(
    rng: &SystemRandom,
    public_key: &str,
) -> Result<String, ChallengeError> {
    Ok(format!(
        "{CHALLENGE_PREFIX}\nWallet: {public_key}\nNonce: {}",
        random_nonce(rng)?
    ))
}

fn random_nonce(rng: &SystemRandom) -> Result<String, ChallengeError> {
    let mut nonce = [0_u8; CHALLENGE_NONCE_BYTES];
    rng.fill(&mut nonce).map_err(|_| ChallengeError::Random)?;
    Ok(hex::encode(nonce))
}

/// Shape check only. The devserver never verifies the signature itself.
///
/// Desktop wallets send base64 and the mobile signing page sends base58; the
/// first encoding that yields 64 bytes wins.
pub fn check_signature_shape(signature: &str) -> Result<(), ChallengeError> {
    let signature = signature.trim();
    let decoded = [
        STANDARD.decode(signature).ok(),
        bs58::decode(signature).into_vec().ok(),
    ];

    let mut decoded_len = None;
    for bytes in decoded.into_iter().flatten() {
        if bytes.len() == ED25519_SIGNATURE_BYTES {
            return Ok(());
        }
        decoded_len.get_or_insert(bytes.len());
    }

    match decoded_len {
        Some(len) => Err(ChallengeError::SignatureLength(len)),
        None => Err(ChallengeError::SignatureEncoding),
    }
}
