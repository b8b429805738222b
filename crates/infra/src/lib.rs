//! Infrastructure layer: broker transports, the resilient publisher, config.

pub mod config;
pub mod event_bus;

pub use config::{ConfigError, PublisherConfig};
pub use event_bus::{BrokerPublisher, ConnectOutcome, ConnectionState, PublisherSettings};
