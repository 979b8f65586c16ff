use std::fmt;

use serde::Serialize;
use wallet_pairing_transport::QrPayloadV1;
use wallet_pairing_transport::wire::{SessionStatus, StatusResponse};

pub const EXPIRED_LABEL: &str = "Expired";

const CREATING_MESSAGE: &str = "Creating pairing session...";
const AWAITING_SCAN_MESSAGE: &str = "Waiting for wallet scan...";
const CONFIRMED_MESSAGE: &str = "Wallet linked";
const EXPIRED_MESSAGE: &str = "Session expired";
const FAILED_MESSAGE: &str = "Pairing failed";
const NOT_FOUND_MESSAGE: &str = "session not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingStatus {
    Idle,
    Pending,
    Confirmed,
    Expired,
    Failed,
    NotFound,
    Error,
}

impl PairingStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Expired | Self::Failed | Self::NotFound
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PairingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pairing attempt as issued by the authority. `session_id` and
/// `expires_at_ms` never change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    session_id: String,
    expires_at_ms: u64,
    challenge: Option<String>,
    linked_public_key: Option<String>,
}

impl PairingSession {
    #[must_use]
    pub const fn new(session_id: String, expires_at_ms: u64, challenge: Option<String>) -> Self {
        Self {
            session_id,
            expires_at_ms,
            challenge,
            linked_public_key: None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub const fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms
    }

    #[must_use]
    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }

    #[must_use]
    pub fn linked_public_key(&self) -> Option<&str> {
        self.linked_public_key.as_deref()
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub generation: u64,
    pub status: PairingStatus,
    pub status_message: String,
    pub session_id: Option<String>,
    pub expires_at: Option<u64>,
    pub challenge: Option<String>,
    pub linked_public_key: Option<String>,
    pub countdown: String,
    pub qr_payload: Option<QrPayloadV1>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Status(StatusResponse),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Response belongs to a session that is no longer the active one.
    Stale,
    AlreadyTerminal,
    NotPending,
    OutOfOrder,
    UnrecognizedStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Updated,
    Terminal(PairingStatus),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Ticked,
    LocallyExpired,
    Frozen,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMachine {
    generation: u64,
    status: PairingStatus,
    status_message: String,
    session: Option<PairingSession>,
    countdown: String,
    last_poll_seq: u64,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generation: 0,
            status: PairingStatus::Idle,
            status_message: String::new(),
            session: None,
            countdown: String::new(),
            last_poll_seq: 0,
        }
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn status(&self) -> PairingStatus {
        self.status
    }

    #[must_use]
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    #[must_use]
    pub const fn session(&self) -> Option<&PairingSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn countdown(&self) -> &str {
        &self.countdown
    }

    /// `true` while `generation` is current and still waiting on the wallet.
    #[must_use]
    pub fn is_polling(&self, generation: u64) -> bool {
        self.generation == generation && self.status == PairingStatus::Pending
    }

    /// Drops any previous session and returns the generation of the new attempt.
    pub fn begin(&mut self) -> u64 {
        self.clear();
        self.status_message = CREATING_MESSAGE.to_string();
        self.generation
    }

    pub fn reset(&mut self) -> u64 {
        self.clear();
        self.generation
    }

    /// Returns `false` when `generation` has been superseded.
    pub fn activate(&mut self, generation: u64, session: PairingSession, now_ms: u64) -> bool {
        if generation != self.generation || self.status != PairingStatus::Idle {
            return false;
        }

        self.countdown = format_remaining(session.expires_at_ms.saturating_sub(now_ms));
        self.session = Some(session);
        self.status = PairingStatus::Pending;
        self.status_message = AWAITING_SCAN_MESSAGE.to_string();
        true
    }

    pub fn fail_init(&mut self, generation: u64, message: String) -> bool {
        if generation != self.generation || self.status != PairingStatus::Idle {
            return false;
        }

        self.status = PairingStatus::Error;
        self.status_message = message;
        true
    }

    pub fn apply_poll(&mut self, generation: u64, seq: u64, outcome: PollOutcome) -> Transition {
        if generation != self.generation {
            return Transition::Ignored(IgnoreReason::Stale);
        }
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::AlreadyTerminal);
        }
        if self.status != PairingStatus::Pending {
            return Transition::Ignored(IgnoreReason::NotPending);
        }
        if seq <= self.last_poll_seq {
            return Transition::Ignored(IgnoreReason::OutOfOrder);
        }

        let response = match outcome {
            PollOutcome::NotFound => {
                self.last_poll_seq = seq;
                return self.finish(PairingStatus::NotFound, NOT_FOUND_MESSAGE.to_string());
            }
            PollOutcome::Status(response) => response,
        };

        if response.status == SessionStatus::Unknown {
            return Transition::Ignored(IgnoreReason::UnrecognizedStatus);
        }
        self.last_poll_seq = seq;

        match response.status {
            SessionStatus::Pending => {
                if let Some(message) = response.message {
                    self.status_message = message;
                }
                Transition::Updated
            }
            SessionStatus::Confirmed => {
                if let (Some(session), Some(public_key)) =
                    (self.session.as_mut(), response.public_key)
                {
                    session.linked_public_key = Some(public_key);
                }
                self.finish(
                    PairingStatus::Confirmed,
                    response
                        .message
                        .unwrap_or_else(|| CONFIRMED_MESSAGE.to_string()),
                )
            }
            SessionStatus::Expired => self.finish(
                PairingStatus::Expired,
                response
                    .message
                    .unwrap_or_else(|| EXPIRED_MESSAGE.to_string()),
            ),
            SessionStatus::Failed => self.finish(
                PairingStatus::Failed,
                response
                    .message
                    .unwrap_or_else(|| FAILED_MESSAGE.to_string()),
            ),
            SessionStatus::Unknown => Transition::Ignored(IgnoreReason::UnrecognizedStatus),
        }
    }

    /// Recomputes the display countdown; expires the session locally once
    /// `expires_at_ms` has passed without a terminal status from the authority.
    pub fn tick_countdown(&mut self, generation: u64, now_ms: u64) -> CountdownTick {
        if generation != self.generation {
            return CountdownTick::Stale;
        }
        if self.status != PairingStatus::Pending {
            return CountdownTick::Frozen;
        }
        let Some(session) = &self.session else {
            return CountdownTick::Frozen;
        };

        let remaining = session.expires_at_ms.saturating_sub(now_ms);
        if remaining == 0 {
            self.finish(PairingStatus::Expired, EXPIRED_MESSAGE.to_string());
            return CountdownTick::LocallyExpired;
        }

        self.countdown = format_remaining(remaining);
        CountdownTick::Ticked
    }

    #[must_use]
    pub fn snapshot(&self, qr_payload: Option<&QrPayloadV1>) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            status: self.status,
            status_message: self.status_message.clone(),
            session_id: self.session.as_ref().map(|s| s.session_id.clone()),
            expires_at: self.session.as_ref().map(|s| s.expires_at_ms),
            challenge: self.session.as_ref().and_then(|s| s.challenge.clone()),
            linked_public_key: self
                .session
                .as_ref()
                .and_then(|s| s.linked_public_key.clone()),
            countdown: self.countdown.clone(),
            qr_payload: qr_payload.cloned(),
        }
    }

    fn finish(&mut self, status: PairingStatus, message: String) -> Transition {
        self.status = status;
        self.status_message = message;
        self.countdown = EXPIRED_LABEL.to_string();
        Transition::Terminal(status)
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.status = PairingStatus::Idle;
        self.status_message.clear();
        self.session = None;
        self.countdown.clear();
        self.last_poll_seq = 0;
    }
}

/// `m:ss`, rounding partial seconds up so the label only reads `0:00` at expiry.
#[must_use]
pub fn format_remaining(remaining_ms: u64) -> String {
    let total_secs = remaining_ms.div_ceil(1_000);
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
