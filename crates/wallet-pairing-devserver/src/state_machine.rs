use thiserror::Error;
use wallet_pairing_transport::wire::SessionStatus;

/// Server-side lifecycle of a pairing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSessionState {
    Pending,
    Confirmed,
    Expired,
    Failed,
}

impl ServerSessionState {
    #[must_use]
    pub const fn as_status(self) -> SessionStatus {
        match self {
            Self::Pending => SessionStatus::Pending,
            Self::Confirmed => SessionStatus::Confirmed,
            Self::Expired => SessionStatus::Expired,
            Self::Failed => SessionStatus::Failed,
        }
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("session is expired")]
    Expired,

    #[error("session is already confirmed")]
    AlreadyConfirmed,

    #[error("session has failed")]
    Failed,
}

/// State as observed at `now_ms`; a pending session past its expiry reads as expired.
#[must_use]
pub const fn effective_state(
    state: ServerSessionState,
    expires_at_ms: u64,
    now_ms: u64,
) -> ServerSessionState {
    match state {
        ServerSessionState::Pending if now_ms >= expires_at_ms => ServerSessionState::Expired,
        other => other,
    }
}

pub fn transition_on_verify(
    state: ServerSessionState,
    expires_at_ms: u64,
    now_ms: u64,
) -> Result<ServerSessionState, StateMachineError> {
    match effective_state(state, expires_at_ms, now_ms) {
        ServerSessionState::Pending => Ok(ServerSessionState::Confirmed),
        ServerSessionState::Confirmed => Err(StateMachineError::AlreadyConfirmed),
        ServerSessionState::Expired => Err(StateMachineError::Expired),
        ServerSessionState::Failed => Err(StateMachineError::Failed),
    }
}

/// A malformed verification ends a live pending session as failed.
pub fn transition_on_rejection(
    state: ServerSessionState,
    expires_at_ms: u64,
    now_ms: u64,
) -> Result<ServerSessionState, StateMachineError> {
    transition_on_verify(state, expires_at_ms, now_ms).map(|_| ServerSessionState::Failed)
}

#[must_use]
pub const fn status_message(state: ServerSessionState) -> &'static str {
    match state {
        ServerSessionState::Pending => "Awaiting wallet scan...",
        ServerSessionState::Confirmed => "Wallet linked",
        ServerSessionState::Expired => "Session expired",
        ServerSessionState::Failed => "Verification failed",
    }
}
