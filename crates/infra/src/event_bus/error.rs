//! Broker and publish errors.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a broker transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The transport session could not be opened (unreachable, auth rejected,
    /// negotiation failed) or died.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// Opening, configuring or using the confirm channel failed.
    #[error("broker channel error: {0}")]
    Channel(String),

    /// The broker answered with something the publisher cannot use.
    #[error("broker protocol error: {0}")]
    Protocol(String),

    /// The session was already closed when it was used.
    #[error("broker link is closed")]
    LinkClosed,
}

impl BrokerError {
    /// Whether the error means the session is unusable and must be replaced.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            BrokerError::Connection(_) | BrokerError::Channel(_) | BrokerError::LinkClosed
        )
    }
}

/// Why a publish did not end with a positive confirmation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// `close()` was called; the publisher stays down until `connect()`.
    #[error("publisher is closed")]
    Closed,

    /// No channel was available, even after the on-demand connect.
    #[error("no broker channel available")]
    NotConnected,

    /// The event could not be encoded.
    #[error("event serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The broker negatively acknowledged the message.
    #[error("broker rejected the message")]
    Rejected,

    /// No confirmation arrived in time.
    #[error("no broker confirmation within {0:?}")]
    ConfirmTimeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_failures_are_classified() {
        assert!(BrokerError::Connection("reset by peer".into()).is_link_failure());
        assert!(BrokerError::Channel("closed".into()).is_link_failure());
        assert!(BrokerError::LinkClosed.is_link_failure());
        assert!(!BrokerError::Protocol("confirms disabled".into()).is_link_failure());
    }

    #[test]
    fn publish_error_wraps_broker_error_transparently() {
        let err: PublishError = BrokerError::LinkClosed.into();
        assert_eq!(err.to_string(), "broker link is closed");
        assert_eq!(
            PublishError::ConfirmTimeout(Duration::from_secs(5)).to_string(),
            "no broker confirmation within 5s"
        );
    }
}
