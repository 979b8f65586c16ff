use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::state_machine::{
    ServerSessionState, StateMachineError, transition_on_rejection, transition_on_verify,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: Option<String>,
    pub origin: Option<String>,
    pub challenge: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub state: ServerSessionState,
    pub public_key: Option<String>,
    pub finished_at_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CreateSessionInput {
    pub session_id: String,
    pub user_id: Option<String>,
    pub origin: Option<String>,
    pub challenge: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] StateMachineError),
}

/// Sessions, per-user wallet links and outstanding link challenges, held in memory only.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    wallets: Mutex<HashMap<String, String>>,
    link_challenges: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&self, input: CreateSessionInput) -> SessionRecord {
        let record = SessionRecord {
            session_id: input.session_id,
            user_id: input.user_id,
            origin: input.origin,
            challenge: input.challenge,
            created_at_ms: input.created_at_ms,
            expires_at_ms: input.expires_at_ms,
            state: ServerSessionState::Pending,
            public_key: None,
            finished_at_ms: None,
        };

        self.sessions()
            .insert(record.session_id.clone(), record.clone());
        record
    }

    #[must_use]
    pub fn get_session(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions().get(session_id).cloned()
    }

    /// Confirms a live pending session and links the key to the session's user.
    pub fn confirm_session(
        &self,
        session_id: &str,
        public_key: &str,
        now_ms: u64,
    ) -> Result<SessionRecord, StoreError> {
        let confirmed = {
            let mut sessions = self.sessions();
            let record = sessions
                .get_mut(session_id)
                .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

            match transition_on_verify(record.state, record.expires_at_ms, now_ms) {
                Ok(next) => {
                    record.state = next;
                    record.public_key = Some(public_key.to_string());
                    record.finished_at_ms = Some(now_ms);
                    record.clone()
                }
                Err(StateMachineError::Expired) => {
                    record.state = ServerSessionState::Expired;
                    record.finished_at_ms.get_or_insert(now_ms);
                    return Err(StateMachineError::Expired.into());
                }
                Err(error) => return Err(error.into()),
            }
        };

        if let Some(user_id) = &confirmed.user_id {
            self.link_wallet(user_id, public_key);
        }

        Ok(confirmed)
    }

    /// Ends a live pending session as failed after a malformed verification.
    pub fn fail_session(&self, session_id: &str, now_ms: u64) -> Result<SessionRecord, StoreError> {
        let mut sessions = self.sessions();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        let next = transition_on_rejection(record.state, record.expires_at_ms, now_ms)?;
        record.state = next;
        record.finished_at_ms = Some(now_ms);
        Ok(record.clone())
    }

    /// Marks pending sessions past their expiry as expired and returns their ids.
    pub fn expire_sessions(&self, now_ms: u64) -> Vec<String> {
        let mut expired = Vec::new();
        for record in self.sessions().values_mut() {
            if record.state == ServerSessionState::Pending && now_ms >= record.expires_at_ms {
                record.state = ServerSessionState::Expired;
                record.finished_at_ms = Some(now_ms);
                expired.push(record.session_id.clone());
            }
        }
        expired
    }

    /// Drops finished sessions that ended before `older_than_ms`.
    pub fn prune_sessions(&self, older_than_ms: u64) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, record| {
            !record.state.is_finished()
                || record
                    .finished_at_ms
                    .is_none_or(|finished_at| finished_at >= older_than_ms)
        });
        before - sessions.len()
    }

    pub fn link_wallet(&self, user_id: &str, address: &str) {
        self.wallets()
            .insert(user_id.to_string(), address.to_string());
    }

    #[must_use]
    pub fn wallet_for(&self, user_id: &str) -> Option<String> {
        self.wallets().get(user_id).cloned()
    }

    /// Replaces any earlier challenge issued for `public_key`.
    pub fn issue_link_challenge(&self, public_key: &str, message: &str) {
        self.link_challenges()
            .insert(public_key.to_string(), message.to_string());
    }

    /// Consumes the challenge for `public_key` if `message` matches it.
    pub fn redeem_link_challenge(&self, public_key: &str, message: &str) -> bool {
        let mut challenges = self.link_challenges();
        if challenges.get(public_key).is_some_and(|issued| issued == message) {
            challenges.remove(public_key);
            return true;
        }
        false
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wallets(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.wallets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn link_challenges(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.link_challenges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
