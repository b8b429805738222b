//! Publisher state, connect outcomes and runtime counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::error::BrokerError;

/// Connection lifecycle state.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnected        (close())
///                                          -> Reconnecting -> Connecting (link lost)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Result of a `connect()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// This call established the session.
    Connected,
    /// A session was already live; nothing was done.
    AlreadyConnected,
    /// Another connect attempt is in flight; this call was a no-op.
    InProgress,
    /// The attempt failed; a retry has been scheduled.
    Failed(BrokerError),
}

impl ConnectOutcome {
    /// Whether a session is live after this call.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected | ConnectOutcome::AlreadyConnected)
    }
}

/// Snapshot of publisher counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub connect_attempts: u64,
    pub connections_established: u64,
    pub reconnects_scheduled: u64,
    pub published: u64,
    pub confirmed: u64,
    pub rejected: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub connect_attempts: AtomicU64,
    pub connections_established: AtomicU64,
    pub reconnects_scheduled: AtomicU64,
    pub published: AtomicU64,
    pub confirmed: AtomicU64,
    pub rejected: AtomicU64,
    pub failed: AtomicU64,
}

impl StatCounters {
    pub fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
