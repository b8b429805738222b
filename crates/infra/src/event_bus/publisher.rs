//! Resilient confirmed publisher.
//!
//! [`BrokerPublisher`] owns at most one broker session (connection + confirm
//! channel) and keeps it alive:
//!
//! - **Connect** is coalesced: while an attempt is in flight further calls are
//!   no-ops, so at most one connect sequence runs at a time.
//! - **Failures** (connect errors, unexpected closes, dead-link publish errors)
//!   are turned into lifecycle events consumed by a single supervisor task,
//!   which waits the fixed backoff and connects again. Retrying never stops.
//! - **Intentional close** sets a shutdown flag before closing anything, and
//!   every session carries a generation number, so close reports from sessions
//!   we closed or replaced never trigger a reconnect.
//! - **Publish** serializes submissions per session so delivery tags follow
//!   submission order. The broker confirmation is awaited outside that gate,
//!   so concurrent publishes overlap their round trips. Submitting (including
//!   waiting for its turn) and awaiting the confirmation are each bounded by
//!   the confirm timeout.
//! - **State** is published while holding the session slot, so the observed
//!   state always matches the slot once the publisher is idle.
//!
//! The retry policy is a fixed delay without a ceiling. That favours eventual
//! availability over failing fast; repeated failures are escalated in the logs
//! only.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use authsvc_events::{DOMAIN_EVENTS_EXCHANGE, DomainEvent, EventPublisher};

use super::error::{BrokerError, PublishError};
use super::state::{ConnectOutcome, ConnectionState, PublisherStats, StatCounters};
use super::transport::{
    BrokerSession, BrokerTransport, CloseNotifier, Confirmation, LinkEvent, PendingConfirm,
};

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Default bound on a single publish-confirm round trip.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Every Nth consecutive connect failure is logged at `error` level.
const ESCALATE_EVERY_FAILURES: u64 = 10;

/// Tunables of a [`BrokerPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherSettings {
    /// Durable topic exchange all events go to.
    pub exchange: String,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Upper bound for submitting one message, and again for awaiting its
    /// confirmation.
    pub confirm_timeout: Duration,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            exchange: DOMAIN_EVENTS_EXCHANGE.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }
}

impl PublisherSettings {
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }
}

/// The live session plus the gate serializing submissions on it.
#[derive(Clone)]
struct Link {
    generation: u64,
    session: Arc<dyn BrokerSession>,
    gate: Arc<Mutex<()>>,
}

struct Shared<T> {
    transport: T,
    settings: PublisherSettings,

    /// Never held across an `.await`.
    link: RwLock<Option<Link>>,
    connecting: AtomicBool,
    shutdown: AtomicBool,
    retry_scheduled: AtomicBool,
    generation: AtomicU64,
    consecutive_failures: AtomicU64,

    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<LinkEvent>,
    stats: StatCounters,
}

/// Process-wide event publisher with transparent reconnection.
///
/// Cheap to clone; clones share the same session. Construct once at startup
/// and pass it to request handlers explicitly.
pub struct BrokerPublisher<T: BrokerTransport> {
    shared: Arc<Shared<T>>,
}

impl<T: BrokerTransport> Clone for BrokerPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: BrokerTransport> core::fmt::Debug for BrokerPublisher<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BrokerPublisher")
            .field("exchange", &self.shared.settings.exchange)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: BrokerTransport> BrokerPublisher<T> {
    /// Create a disconnected publisher and start its supervisor task.
    ///
    /// Must be called from within a Tokio runtime. Nothing is opened until
    /// [`connect`](Self::connect) or the first publish.
    pub fn new(transport: T, settings: PublisherSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let shared = Arc::new(Shared {
            transport,
            settings,
            link: RwLock::new(None),
            connecting: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            retry_scheduled: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            state,
            events: events_tx,
            stats: StatCounters::default(),
        });

        tokio::spawn(supervise(Arc::downgrade(&shared), events_rx));

        Self { shared }
    }

    /// Open the session if none is live.
    ///
    /// A no-op while another attempt is in flight or a session is already
    /// live. On failure a retry is scheduled after the reconnect delay.
    /// Calling `connect` after [`close`](Self::close) re-enables the publisher.
    pub async fn connect(&self) -> ConnectOutcome {
        self.shared.shutdown.store(false, Ordering::SeqCst);
        self.shared.establish().await
    }

    /// Publish `event` and wait for the broker confirmation.
    ///
    /// Returns `true` only on a positive confirmation. Failures are logged and
    /// reported as `false`; nothing is retried here.
    pub async fn publish(&self, routing_key: &str, event: DomainEvent) -> bool {
        match self.try_publish(routing_key, event).await {
            Ok(()) => true,
            Err(err @ PublishError::Serialization(_)) => {
                error!(routing_key, error = %err, "event could not be serialized; dropped");
                false
            }
            Err(err) => {
                warn!(routing_key, error = %err, "event publish failed");
                false
            }
        }
    }

    /// Like [`publish`](Self::publish) but reports why a publish failed.
    #[instrument(
        skip(self, event),
        fields(
            exchange = %self.shared.settings.exchange,
            routing_key = %routing_key,
            event_type = %event.event_type()
        )
    )]
    pub async fn try_publish(&self, routing_key: &str, event: DomainEvent) -> Result<(), PublishError> {
        let shared = &self.shared;

        if shared.shutdown.load(Ordering::SeqCst) {
            return Err(shared.failed(PublishError::Closed));
        }

        let link = match shared.current_link() {
            Some(link) => link,
            None => {
                warn!("no broker channel; connecting on demand");
                shared.establish().await;
                match shared.current_link() {
                    Some(link) => link,
                    None => return Err(shared.failed(PublishError::NotConnected)),
                }
            }
        };

        let payload = event
            .to_json_bytes()
            .map_err(|e| shared.failed(PublishError::Serialization(e.to_string())))?;

        let timeout = shared.settings.confirm_timeout;
        let exchange = shared.settings.exchange.as_str();

        // The gate covers the submission only.
        let submission = async {
            let _turn = link.gate.lock().await;
            link.session.submit(exchange, routing_key, payload).await
        };
        let pending: PendingConfirm = match tokio::time::timeout(timeout, submission).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(err)) => return Err(shared.link_error(link.generation, err)),
            Err(_) => return Err(shared.failed(PublishError::ConfirmTimeout(timeout))),
        };
        StatCounters::bump(&shared.stats.published);

        match tokio::time::timeout(timeout, pending).await {
            Ok(Ok(Confirmation::Ack)) => {
                StatCounters::bump(&shared.stats.confirmed);
                debug!("event confirmed by broker");
                Ok(())
            }
            Ok(Ok(Confirmation::Nack)) => {
                StatCounters::bump(&shared.stats.rejected);
                Err(PublishError::Rejected)
            }
            Ok(Err(err)) => Err(shared.link_error(link.generation, err)),
            Err(_) => Err(shared.failed(PublishError::ConfirmTimeout(timeout))),
        }
    }

    /// Close the channel, then the connection, and stop reconnecting.
    ///
    /// Each close is attempted even if the other fails. Idempotent.
    #[instrument(skip(self), fields(exchange = %self.shared.settings.exchange))]
    pub async fn close(&self) {
        let shared = &self.shared;

        // Set before touching the session so its close report is ignored.
        shared.shutdown.store(true, Ordering::SeqCst);
        let link = {
            let mut slot = shared.link_write();
            shared.set_state(ConnectionState::Disconnected);
            slot.take()
        };

        let Some(link) = link else {
            debug!("close requested while already disconnected");
            return;
        };

        close_session(link.session.as_ref()).await;
        info!(generation = link.generation, "publisher closed");
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.current_link().is_some()
    }

    pub fn stats(&self) -> PublisherStats {
        self.shared.stats.snapshot()
    }

    pub fn settings(&self) -> &PublisherSettings {
        &self.shared.settings
    }
}

#[async_trait]
impl<T: BrokerTransport> EventPublisher for BrokerPublisher<T> {
    async fn publish(&self, routing_key: &str, event: DomainEvent) -> bool {
        BrokerPublisher::publish(self, routing_key, event).await
    }
}

impl<T: BrokerTransport> Shared<T> {
    fn current_link(&self) -> Option<Link> {
        self.link
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn link_write(&self) -> RwLockWriteGuard<'_, Option<Link>> {
        self.link.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn failed(&self, err: PublishError) -> PublishError {
        StatCounters::bump(&self.stats.failed);
        err
    }

    /// A dead connection or channel found by a publish takes the same path
    /// as a close notification.
    fn link_error(&self, generation: u64, err: BrokerError) -> PublishError {
        if err.is_link_failure() {
            self.report_lost(generation, err.to_string());
        }
        self.failed(PublishError::Broker(err))
    }

    /// Coalesced connect: at most one attempt in flight.
    async fn establish(&self) -> ConnectOutcome {
        if self.current_link().is_some() {
            return ConnectOutcome::AlreadyConnected;
        }

        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("connect already in progress; skipping");
            return ConnectOutcome::InProgress;
        }

        let outcome = self.open_link().await;
        self.connecting.store(false, Ordering::SeqCst);
        outcome
    }

    #[instrument(skip(self), fields(exchange = %self.settings.exchange))]
    async fn open_link(&self) -> ConnectOutcome {
        // Another attempt may have finished between the first check and
        // taking the connecting flag.
        if self.current_link().is_some() {
            return ConnectOutcome::AlreadyConnected;
        }

        self.set_state(ConnectionState::Connecting);
        let attempt = StatCounters::bump(&self.stats.connect_attempts);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let notifier = CloseNotifier::new(generation, self.events.clone());

        let session = match self.transport.open(&self.settings.exchange, notifier).await {
            Ok(session) => session,
            Err(err) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures % ESCALATE_EVERY_FAILURES == 0 {
                    error!(
                        attempt,
                        failures,
                        error = %err,
                        "broker still unreachable; publishing is degraded"
                    );
                } else {
                    warn!(
                        attempt,
                        failures,
                        error = %err,
                        retry_in = ?self.settings.reconnect_delay,
                        "broker connect failed"
                    );
                }
                self.set_state(ConnectionState::Disconnected);
                self.schedule_retry();
                return ConnectOutcome::Failed(err);
            }
        };

        // Checked under the slot lock: `close()` sets the flag before taking
        // the slot, so a session opened during a close is never installed.
        let installed = {
            let mut slot = self.link_write();
            if self.shutdown.load(Ordering::SeqCst) {
                self.set_state(ConnectionState::Disconnected);
                false
            } else {
                *slot = Some(Link {
                    generation,
                    session: Arc::clone(&session),
                    gate: Arc::new(Mutex::new(())),
                });
                self.set_state(ConnectionState::Connected);
                true
            }
        };

        if !installed {
            debug!(generation, "publisher closed while connecting; discarding session");
            close_session(session.as_ref()).await;
            return ConnectOutcome::Failed(BrokerError::LinkClosed);
        }

        self.consecutive_failures.store(0, Ordering::SeqCst);
        StatCounters::bump(&self.stats.connections_established);
        info!(generation, attempt, "publisher connected with confirm channel");
        ConnectOutcome::Connected
    }

    fn claim_retry(&self) -> bool {
        let claimed = self
            .retry_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if claimed {
            StatCounters::bump(&self.stats.reconnects_scheduled);
        }
        claimed
    }

    fn schedule_retry(&self) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        if self.claim_retry() {
            let _ = self.events.send(LinkEvent::RetryConnect);
        }
    }

    fn report_lost(&self, generation: u64, reason: String) {
        let _ = self.events.send(LinkEvent::Lost { generation, reason });
    }

    /// Take the session of `generation` out of the slot if it is the live
    /// one. Returns the dead link when a reconnect is due.
    fn on_link_lost(&self, generation: u64, reason: &str) -> Option<Link> {
        if self.shutdown.load(Ordering::SeqCst) {
            debug!(generation, reason, "link closed after shutdown; not reconnecting");
            return None;
        }

        let dead = {
            let mut slot = self.link_write();
            match slot.as_ref() {
                Some(link) if link.generation == generation => {
                    self.set_state(ConnectionState::Reconnecting);
                    slot.take()
                }
                _ => None,
            }
        };

        match dead {
            Some(link) => {
                warn!(generation, reason, "broker link lost unexpectedly; reconnecting");
                Some(link)
            }
            None => {
                debug!(generation, reason, "ignoring close report for a replaced session");
                None
            }
        }
    }
}

/// Supervisor loop: turns lifecycle events into delayed reconnect attempts.
///
/// Holds only a weak reference so dropping the last publisher handle ends it.
async fn supervise<T: BrokerTransport>(
    shared: Weak<Shared<T>>,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
) {
    while let Some(event) = events.recv().await {
        let delay = {
            let Some(shared) = shared.upgrade() else { break };
            let reconnect = match event {
                LinkEvent::RetryConnect => true,
                LinkEvent::Lost { generation, reason } => {
                    match shared.on_link_lost(generation, &reason) {
                        Some(dead) => {
                            // Only the channel may have died; release the connection.
                            let discard = discard_session(dead.session.as_ref());
                            if tokio::time::timeout(shared.settings.confirm_timeout, discard)
                                .await
                                .is_err()
                            {
                                debug!(generation, "closing the dead session timed out");
                            }
                            shared.claim_retry()
                        }
                        None => false,
                    }
                }
            };
            if !reconnect {
                continue;
            }
            shared.settings.reconnect_delay
        };

        tokio::time::sleep(delay).await;

        let Some(shared) = shared.upgrade() else { break };
        shared.retry_scheduled.store(false, Ordering::SeqCst);
        if shared.shutdown.load(Ordering::SeqCst) {
            debug!("publisher closed during backoff; retry cancelled");
            continue;
        }
        shared.establish().await;
    }
}

async fn close_session(session: &dyn BrokerSession) {
    if let Err(err) = session.close_channel().await {
        warn!(error = %err, "failed to close broker channel");
    }
    if let Err(err) = session.close_connection().await {
        warn!(error = %err, "failed to close broker connection");
    }
}

/// Best-effort close of a session already known to be broken.
async fn discard_session(session: &dyn BrokerSession) {
    if let Err(err) = session.close_channel().await {
        debug!(error = %err, "dead channel close failed");
    }
    if let Err(err) = session.close_connection().await {
        debug!(error = %err, "dead connection close failed");
    }
}
