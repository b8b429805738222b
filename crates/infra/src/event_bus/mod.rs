//! Broker-backed event publishing.
//!
//! The publishing port lives in `authsvc-events`. This module provides the
//! resilient [`BrokerPublisher`] and the transports it runs on:
//!
//! - [`InMemoryBroker`]: scriptable broker for tests/dev
//! - `AmqpTransport`: RabbitMQ via lapin (feature `amqp`)

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod error;
pub mod in_memory;
pub mod publisher;
pub mod state;
pub mod transport;

#[cfg(feature = "amqp")]
pub use amqp::AmqpTransport;
pub use error::{BrokerError, PublishError};
pub use in_memory::{BrokeredMessage, InMemoryBroker};
pub use publisher::{
    BrokerPublisher, DEFAULT_CONFIRM_TIMEOUT, DEFAULT_RECONNECT_DELAY, PublisherSettings,
};
pub use state::{ConnectOutcome, ConnectionState, PublisherStats};
pub use transport::{BrokerSession, BrokerTransport, CloseNotifier, Confirmation, PendingConfirm};
