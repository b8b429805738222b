//! Transport seam between the publisher state machine and a concrete broker.
//!
//! A [`BrokerTransport`] opens one [`BrokerSession`] per successful connect:
//! a transport connection plus one confirm-mode channel on which the topic
//! exchange has already been declared. The publisher owns the session
//! exclusively and replaces it after a failure.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::BrokerError;

/// Broker verdict on a single published message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Ack,
    Nack,
}

/// Broker confirmation for one submitted message, resolved independently of
/// later submissions on the same channel.
pub type PendingConfirm = Pin<Box<dyn Future<Output = Result<Confirmation, BrokerError>> + Send>>;

/// Opens broker sessions.
#[async_trait]
pub trait BrokerTransport: Send + Sync + 'static {
    /// Open a connection and a confirm channel, and declare `exchange` as a
    /// durable topic exchange.
    ///
    /// The transport must report any later unexpected loss of the session
    /// through `notifier`.
    async fn open(
        &self,
        exchange: &str,
        notifier: CloseNotifier,
    ) -> Result<Arc<dyn BrokerSession>, BrokerError>;
}

/// A live connection + confirm channel.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Submit a persistent message and return the pending confirmation.
    ///
    /// The broker assigns delivery tags in submission order, so callers that
    /// care about ordering must serialize submissions. Waiting for the
    /// returned confirmation needs no such care.
    async fn submit(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<PendingConfirm, BrokerError>;

    async fn close_channel(&self) -> Result<(), BrokerError>;

    async fn close_connection(&self) -> Result<(), BrokerError>;
}

/// Lifecycle notifications consumed by the publisher's supervisor task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkEvent {
    /// A connect attempt failed; retry after the backoff.
    RetryConnect,
    /// The session of `generation` died.
    Lost { generation: u64, reason: String },
}

/// Handle a transport uses to report that its session died.
///
/// Tagged with the session generation so the publisher can ignore reports
/// from sessions it already replaced or closed itself.
#[derive(Debug, Clone)]
pub struct CloseNotifier {
    generation: u64,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl CloseNotifier {
    pub(crate) fn new(generation: u64, events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { generation, events }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report that the session closed or errored. Safe to call from any
    /// thread, any number of times.
    pub fn link_lost(&self, reason: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Lost {
            generation: self.generation,
            reason: reason.into(),
        });
    }
}
