//! Event publishing port.
//!
//! ## Delivery contract
//!
//! Publishing is **best effort, at-least-once attempted**:
//!
//! - The business action commits first; publishing happens afterwards and
//!   never rolls it back.
//! - `publish` reports the outcome as a `bool`. `true` means the broker
//!   accepted and stored the message. It does not mean any queue or consumer
//!   received it.
//! - Implementations never panic or return errors for broker trouble; they
//!   log and return `false`.
//! - No retries happen inside `publish`. The caller decides whether to retry,
//!   ignore or compensate.
//!
//! ## Thread Safety
//!
//! The trait requires `Send + Sync`: a single publisher instance is shared by
//! every in-flight request handler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::event::DomainEvent;

/// Publishes domain events to a topic exchange.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event` under `routing_key`, returning whether the broker
    /// confirmed it.
    async fn publish(&self, routing_key: &str, event: DomainEvent) -> bool;
}

#[async_trait]
impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    async fn publish(&self, routing_key: &str, event: DomainEvent) -> bool {
        (**self).publish(routing_key, event).await
    }
}
