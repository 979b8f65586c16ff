use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use wallet_pairing_transport::wire::InitSessionRequest;
use wallet_pairing_transport::{
    AuthorityUrls, QrPayloadInput, QrPayloadV1, build_qr_payload, validate_session_id,
};

use crate::authority::{CreatedSession, SessionAuthority};
use crate::clock::Clock;
use crate::error::{AuthorityError, PairingError};
use crate::session::{
    CountdownTick, IgnoreReason, PairingSession, PollOutcome, SessionMachine, SessionSnapshot,
    Transition,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub urls: AuthorityUrls,
    pub origin: String,
    pub user_id: Option<String>,
    pub poll_interval: Duration,
    pub countdown_interval: Duration,
}

impl CoordinatorConfig {
    #[must_use]
    pub fn new(urls: AuthorityUrls, origin: String, user_id: Option<String>) -> Self {
        Self {
            urls,
            origin,
            user_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
            countdown_interval: COUNTDOWN_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    pub polling: bool,
    pub countdown: bool,
}

/// Owns the pairing lifecycle for one UI surface.
///
/// At most one session is active. Starting a new session or calling
/// [`PollingCoordinator::reset`] aborts the poll and countdown tasks of the
/// previous one before anything new is armed. Dropping the coordinator does
/// the same.
pub struct PollingCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    authority: Arc<dyn SessionAuthority>,
    config: CoordinatorConfig,
    clock: Clock,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<SessionSnapshot>,
}

#[derive(Default)]
struct Inner {
    machine: SessionMachine,
    qr_payload: Option<QrPayloadV1>,
    poll_task: Option<JoinHandle<()>>,
    countdown_task: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_timers(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        if let Some(task) = self.countdown_task.take() {
            task.abort();
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.machine.snapshot(self.qr_payload.as_ref())
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        let next = inner.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn is_polling(&self, generation: u64) -> bool {
        self.lock().machine.is_polling(generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().machine.generation() == generation
    }
}

impl PollingCoordinator {
    #[must_use]
    pub fn new(authority: Arc<dyn SessionAuthority>, config: CoordinatorConfig, clock: Clock) -> Self {
        let inner = Inner::default();
        let (snapshots, _) = watch::channel(inner.snapshot());

        Self {
            shared: Arc::new(Shared {
                authority,
                config,
                clock,
                inner: Mutex::new(inner),
                snapshots,
            }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    #[must_use]
    pub fn timer_state(&self) -> TimerState {
        let inner = self.shared.lock();
        TimerState {
            polling: inner
                .poll_task
                .as_ref()
                .is_some_and(|task| !task.is_finished()),
            countdown: inner
                .countdown_task
                .as_ref()
                .is_some_and(|task| !task.is_finished()),
        }
    }

    /// Creates a fresh session, builds its QR payload, and starts polling.
    ///
    /// Any previous session is discarded first. Polling begins immediately;
    /// the returned snapshot is already `pending`.
    pub async fn start_session(&self) -> Result<SessionSnapshot, PairingError> {
        let generation = {
            let mut inner = self.shared.lock();
            inner.cancel_timers();
            inner.qr_payload = None;
            let generation = inner.machine.begin();
            self.shared.publish(&inner);
            generation
        };

        info!(generation, "starting pairing session");

        let init_request = InitSessionRequest {
            user_id: self.shared.config.user_id.clone(),
            origin: Some(self.shared.config.origin.clone()),
        };

        let created = match self
            .shared
            .authority
            .init_session(&init_request)
            .await
            .and_then(checked_session_id)
        {
            Ok(created) => created,
            Err(error) => {
                warn!(generation, %error, "pairing session init failed");
                let mut inner = self.shared.lock();
                if inner
                    .machine
                    .fail_init(generation, format!("Could not start pairing: {error}"))
                {
                    self.shared.publish(&inner);
                }
                return Err(PairingError::Init(error));
            }
        };

        if !self.shared.is_current(generation) {
            debug!(generation, session_id = %created.session_id, "session superseded during init");
            return Err(PairingError::Superseded);
        }

        let challenge = self.fetch_challenge(&created.session_id).await;

        let payload = match self.build_payload(&created, challenge.as_deref()) {
            Ok(payload) => payload,
            Err(error) => {
                let mut inner = self.shared.lock();
                if inner
                    .machine
                    .fail_init(generation, format!("Could not build QR payload: {error}"))
                {
                    self.shared.publish(&inner);
                }
                return Err(error);
            }
        };

        let mut inner = self.shared.lock();
        let session = PairingSession::new(
            created.session_id.clone(),
            created.expires_at_ms,
            challenge,
        );
        if !inner
            .machine
            .activate(generation, session, self.shared.clock.now_ms())
        {
            debug!(generation, session_id = %created.session_id, "session superseded before activation");
            return Err(PairingError::Superseded);
        }

        inner.qr_payload = Some(payload);
        inner.poll_task = Some(tokio::spawn(poll_loop(
            Arc::clone(&self.shared),
            generation,
            created.session_id.clone(),
        )));
        inner.countdown_task = Some(tokio::spawn(countdown_loop(
            Arc::clone(&self.shared),
            generation,
        )));

        info!(
            generation,
            session_id = %created.session_id,
            expires_at_ms = created.expires_at_ms,
            "pairing session pending"
        );

        self.shared.publish(&inner);
        Ok(inner.snapshot())
    }

    /// Cancels timers and returns to `idle`. Responses still in flight for
    /// the discarded session are ignored.
    pub fn reset(&self) -> SessionSnapshot {
        let mut inner = self.shared.lock();
        inner.cancel_timers();
        inner.qr_payload = None;
        let generation = inner.machine.reset();
        debug!(generation, "pairing session reset");
        self.shared.publish(&inner);
        inner.snapshot()
    }

    async fn fetch_challenge(&self, session_id: &str) -> Option<String> {
        match self.shared.authority.fetch_challenge(session_id).await {
            Ok(Some(challenge)) => Some(challenge),
            Ok(None) => {
                warn!(session_id, "authority issued no challenge; payload carries null");
                None
            }
            Err(error) => {
                warn!(session_id, %error, "challenge fetch failed; continuing without challenge");
                None
            }
        }
    }

    fn build_payload(
        &self,
        created: &CreatedSession,
        challenge: Option<&str>,
    ) -> Result<QrPayloadV1, PairingError> {
        let config = &self.shared.config;
        Ok(build_qr_payload(QrPayloadInput {
            session_id: &created.session_id,
            expires_at_ms: created.expires_at_ms,
            challenge,
            user_id: config.user_id.as_deref(),
            origin: &config.origin,
            urls: &config.urls,
        })?)
    }
}

/// Ids become artifact file names and must stay within the payload charset.
fn checked_session_id(created: CreatedSession) -> Result<CreatedSession, AuthorityError> {
    validate_session_id(&created.session_id).map_err(|error| {
        AuthorityError::Init(format!("authority issued an unusable sessionId: {error}"))
    })?;
    Ok(created)
}

impl Drop for PollingCoordinator {
    fn drop(&mut self) {
        self.shared.lock().cancel_timers();
    }
}

async fn poll_loop(shared: Arc<Shared>, generation: u64, session_id: String) {
    let mut ticker = interval(shared.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        ticker.tick().await;
        if !shared.is_polling(generation) {
            break;
        }

        seq += 1;
        let outcome = match shared.authority.poll_status(&session_id).await {
            Ok(response) => PollOutcome::Status(response),
            Err(AuthorityError::SessionNotFound) => PollOutcome::NotFound,
            Err(error) => {
                warn!(%session_id, seq, %error, "status poll failed; retrying on next tick");
                continue;
            }
        };

        let keep_polling = {
            let mut inner = shared.lock();
            match inner.machine.apply_poll(generation, seq, outcome) {
                Transition::Updated => {
                    shared.publish(&inner);
                    true
                }
                Transition::Terminal(status) => {
                    info!(%session_id, %status, "pairing session finished");
                    if let Some(task) = inner.countdown_task.take() {
                        task.abort();
                    }
                    inner.poll_task = None;
                    shared.publish(&inner);
                    false
                }
                Transition::Ignored(reason) => {
                    debug!(%session_id, seq, ?reason, "discarding status response");
                    !matches!(
                        reason,
                        IgnoreReason::Stale | IgnoreReason::AlreadyTerminal | IgnoreReason::NotPending
                    )
                }
            }
        };

        if !keep_polling {
            break;
        }
    }
}

async fn countdown_loop(shared: Arc<Shared>, generation: u64) {
    let mut ticker = interval(shared.config.countdown_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let keep_ticking = {
            let mut inner = shared.lock();
            match inner
                .machine
                .tick_countdown(generation, shared.clock.now_ms())
            {
                CountdownTick::Ticked => {
                    shared.publish(&inner);
                    true
                }
                CountdownTick::LocallyExpired => {
                    info!(generation, "countdown reached zero; expiring session locally");
                    if let Some(task) = inner.poll_task.take() {
                        task.abort();
                    }
                    inner.countdown_task = None;
                    shared.publish(&inner);
                    false
                }
                CountdownTick::Frozen | CountdownTick::Stale => false,
            }
        };

        if !keep_ticking {
            break;
        }
    }
}
