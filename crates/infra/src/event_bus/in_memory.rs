//! In-memory broker for tests/dev.
//!
//! Behaves like a single-node broker with publisher confirms:
//! - every accepted message gets the next delivery tag and an `Ack`
//! - sessions can be severed to simulate network loss
//! - reachability, connect and confirm latency, nacks and stalled confirms
//!   are scriptable
//! - channels can be closed broker-side while their connection stays up
//!
//! No IO. Connect latency uses `tokio::time`, so paused-clock tests stay
//! deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use authsvc_events::{DomainEvent, EventError};

use super::error::BrokerError;
use super::transport::{BrokerSession, BrokerTransport, CloseNotifier, Confirmation, PendingConfirm};

/// A message the broker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokeredMessage {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

impl BrokeredMessage {
    pub fn decode(&self) -> Result<DomainEvent, EventError> {
        DomainEvent::from_json_bytes(&self.payload)
    }
}

#[derive(Debug)]
struct SessionEntry {
    id: u64,
    alive: Arc<AtomicBool>,
    channel_open: Arc<AtomicBool>,
    notifier: CloseNotifier,
}

#[derive(Debug)]
struct BrokerState {
    reachable: bool,
    connect_latency: Duration,
    confirm_latency: Duration,
    stall_confirms: bool,
    nacks_pending: usize,
    next_delivery_tag: u64,
    connections_opened: u64,
    exchanges: Vec<String>,
    messages: Vec<BrokeredMessage>,
    sessions: Vec<SessionEntry>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            reachable: true,
            connect_latency: Duration::ZERO,
            confirm_latency: Duration::ZERO,
            stall_confirms: false,
            nacks_pending: 0,
            next_delivery_tag: 0,
            connections_opened: 0,
            exchanges: Vec::new(),
            messages: Vec::new(),
            sessions: Vec::new(),
        }
    }
}

/// Scriptable in-memory broker. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BrokerState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// When unreachable, new connections are refused. Live sessions are not
    /// affected; use [`sever_connections`](Self::sever_connections) for that.
    pub fn set_reachable(&self, reachable: bool) {
        self.with_state(|s| s.reachable = reachable);
    }

    pub fn set_connect_latency(&self, latency: Duration) {
        self.with_state(|s| s.connect_latency = latency);
    }

    /// Time between accepting a message and confirming it.
    pub fn set_confirm_latency(&self, latency: Duration) {
        self.with_state(|s| s.confirm_latency = latency);
    }

    /// Negatively acknowledge the next `count` messages.
    pub fn nack_next(&self, count: usize) {
        self.with_state(|s| s.nacks_pending += count);
    }

    /// When set, publishes never receive a confirmation.
    pub fn set_stall_confirms(&self, stall: bool) {
        self.with_state(|s| s.stall_confirms = stall);
    }

    /// Drop every live session as if the network failed.
    pub fn sever_connections(&self) {
        let severed = self.with_state(|s| std::mem::take(&mut s.sessions));
        for entry in severed {
            entry.alive.store(false, Ordering::SeqCst);
            entry.notifier.link_lost("connection reset by broker");
        }
    }

    /// Kill every live session without notifying anyone, like a half-open
    /// TCP connection. The client only finds out on its next publish.
    pub fn sever_connections_silently(&self) {
        let severed = self.with_state(|s| std::mem::take(&mut s.sessions));
        for entry in severed {
            entry.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Close the channel of every live session from the broker side, as on a
    /// channel-level protocol error. Connections stay open and no close is
    /// reported; the client finds out on its next publish.
    pub fn close_channels(&self) {
        self.with_state(|s| {
            for entry in &s.sessions {
                entry.channel_open.store(false, Ordering::SeqCst);
            }
        });
    }

    pub fn connections_opened(&self) -> u64 {
        self.with_state(|s| s.connections_opened)
    }

    pub fn live_connections(&self) -> usize {
        self.with_state(|s| s.sessions.len())
    }

    pub fn declared_exchanges(&self) -> Vec<String> {
        self.with_state(|s| s.exchanges.clone())
    }

    /// Accepted messages in delivery-tag order.
    pub fn messages(&self) -> Vec<BrokeredMessage> {
        self.with_state(|s| s.messages.clone())
    }

    /// Accepted messages a queue bound with exactly `routing_key` would see.
    pub fn messages_with_key(&self, routing_key: &str) -> Vec<BrokeredMessage> {
        self.with_state(|s| {
            s.messages
                .iter()
                .filter(|m| m.routing_key == routing_key)
                .cloned()
                .collect()
        })
    }

    fn forget_session(&self, id: u64) -> Option<SessionEntry> {
        self.with_state(|s| {
            let index = s.sessions.iter().position(|e| e.id == id)?;
            Some(s.sessions.remove(index))
        })
    }
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    async fn open(
        &self,
        exchange: &str,
        notifier: CloseNotifier,
    ) -> Result<Arc<dyn BrokerSession>, BrokerError> {
        let latency = self.with_state(|s| s.connect_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.with_state(|s| {
            if !s.reachable {
                return Err(BrokerError::Connection("connection refused".to_string()));
            }

            s.connections_opened += 1;
            if !s.exchanges.iter().any(|e| e == exchange) {
                s.exchanges.push(exchange.to_string());
            }

            let id = s.connections_opened;
            let alive = Arc::new(AtomicBool::new(true));
            let channel_open = Arc::new(AtomicBool::new(true));
            s.sessions.push(SessionEntry {
                id,
                alive: Arc::clone(&alive),
                channel_open: Arc::clone(&channel_open),
                notifier,
            });

            let session: Arc<dyn BrokerSession> = Arc::new(InMemorySession {
                id,
                broker: self.clone(),
                alive,
                channel_open,
            });
            Ok(session)
        })
    }
}

struct InMemorySession {
    id: u64,
    broker: InMemoryBroker,
    alive: Arc<AtomicBool>,
    channel_open: Arc<AtomicBool>,
}

#[async_trait]
impl BrokerSession for InMemorySession {
    async fn submit(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<PendingConfirm, BrokerError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection("connection reset".to_string()));
        }
        if !self.channel_open.load(Ordering::SeqCst) {
            return Err(BrokerError::Channel("channel closed by broker".to_string()));
        }

        // The verdict is fixed at acceptance so delivery tags follow
        // submission order however the confirmations interleave.
        let (confirmation, latency, stalled) = self.broker.with_state(|s| {
            s.next_delivery_tag += 1;
            let confirmation = if s.nacks_pending > 0 {
                s.nacks_pending -= 1;
                Confirmation::Nack
            } else {
                s.messages.push(BrokeredMessage {
                    delivery_tag: s.next_delivery_tag,
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    payload,
                });
                Confirmation::Ack
            };
            (confirmation, s.confirm_latency, s.stall_confirms)
        });

        let alive = Arc::clone(&self.alive);
        Ok(Box::pin(async move {
            if stalled {
                std::future::pending::<()>().await;
            }
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if !alive.load(Ordering::SeqCst) {
                return Err(BrokerError::Connection("connection reset before confirm".to_string()));
            }
            Ok(confirmation)
        }))
    }

    async fn close_channel(&self) -> Result<(), BrokerError> {
        if !self.channel_open.swap(false, Ordering::SeqCst) {
            return Err(BrokerError::LinkClosed);
        }
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), BrokerError> {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return Err(BrokerError::LinkClosed);
        }
        // Real clients emit a close notification for client-initiated closes
        // too; the publisher has to tell the two apart.
        if let Some(entry) = self.broker.forget_session(self.id) {
            entry.notifier.link_lost("connection closed by client");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::transport::LinkEvent;
    use tokio::sync::mpsc;

    fn notifier(generation: u64) -> (CloseNotifier, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CloseNotifier::new(generation, tx), rx)
    }

    #[tokio::test]
    async fn assigns_increasing_delivery_tags() {
        let broker = InMemoryBroker::new();
        let (n, _rx) = notifier(1);
        let session = broker.open("domain_events", n).await.unwrap();

        for key in ["a.b.c", "d.e.f"] {
            let pending = session.submit("domain_events", key, b"{}".to_vec()).await.unwrap();
            assert_eq!(pending.await.unwrap(), Confirmation::Ack);
        }

        let tags: Vec<u64> = broker.messages().iter().map(|m| m.delivery_tag).collect();
        assert_eq!(tags, vec![1, 2]);
        assert_eq!(broker.messages_with_key("d.e.f").len(), 1);
    }

    #[tokio::test]
    async fn refuses_connections_while_unreachable() {
        let broker = InMemoryBroker::new();
        broker.set_reachable(false);
        let (n, _rx) = notifier(1);

        let err = broker.open("domain_events", n).await.err().unwrap();
        assert!(matches!(err, BrokerError::Connection(_)));
        assert_eq!(broker.connections_opened(), 0);
    }

    #[tokio::test]
    async fn severing_notifies_and_kills_sessions() {
        let broker = InMemoryBroker::new();
        let (n, mut rx) = notifier(3);
        let session = broker.open("domain_events", n).await.unwrap();

        broker.sever_connections();

        assert!(matches!(rx.try_recv(), Ok(LinkEvent::Lost { generation: 3, .. })));
        assert_eq!(broker.live_connections(), 0);
        let err = session.submit("domain_events", "k", Vec::new()).await.err().unwrap();
        assert!(err.is_link_failure());
    }

    #[tokio::test]
    async fn nacked_messages_are_not_stored() {
        let broker = InMemoryBroker::new();
        broker.nack_next(1);
        let (n, _rx) = notifier(1);
        let session = broker.open("domain_events", n).await.unwrap();

        let first = session.submit("domain_events", "k", b"{}".to_vec()).await.unwrap();
        let second = session.submit("domain_events", "k", b"{}".to_vec()).await.unwrap();
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        assert_eq!((first, second), (Confirmation::Nack, Confirmation::Ack));
        assert_eq!(broker.messages().len(), 1);
        assert_eq!(broker.messages()[0].delivery_tag, 2);
    }

    #[tokio::test]
    async fn closed_channel_refuses_publishes_but_keeps_the_connection() {
        let broker = InMemoryBroker::new();
        let (n, mut rx) = notifier(1);
        let session = broker.open("domain_events", n).await.unwrap();

        broker.close_channels();

        let err = session.submit("domain_events", "k", Vec::new()).await.err().unwrap();
        assert!(matches!(err, BrokerError::Channel(_)));
        assert_eq!(broker.live_connections(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmations_resolve_independently_of_later_submissions() {
        let broker = InMemoryBroker::new();
        broker.set_confirm_latency(Duration::from_millis(100));
        let (n, _rx) = notifier(1);
        let session = broker.open("domain_events", n).await.unwrap();

        let first = session.submit("domain_events", "a", b"{}".to_vec()).await.unwrap();
        let second = session.submit("domain_events", "b", b"{}".to_vec()).await.unwrap();
        let started = tokio::time::Instant::now();
        let (first, second) = tokio::join!(first, second);

        assert_eq!((first.unwrap(), second.unwrap()), (Confirmation::Ack, Confirmation::Ack));
        assert!(started.elapsed() < Duration::from_millis(150));
        let tags: Vec<u64> = broker.messages().iter().map(|m| m.delivery_tag).collect();
        assert_eq!(tags, vec![1, 2]);
    }

    #[tokio::test]
    async fn closing_twice_reports_a_closed_link() {
        let broker = InMemoryBroker::new();
        let (n, _rx) = notifier(1);
        let session = broker.open("domain_events", n).await.unwrap();

        session.close_channel().await.unwrap();
        session.close_connection().await.unwrap();

        assert_eq!(session.close_channel().await, Err(BrokerError::LinkClosed));
        assert_eq!(session.close_connection().await, Err(BrokerError::LinkClosed));
    }
}
