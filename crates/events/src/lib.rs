//! Domain events published by the auth service.
//!
//! - [`DomainEvent`]: the wire-level value object (`eventType`, `occurredOn`, `payload`)
//! - [`routing`]: the exchange name and routing keys downstream consumers bind to
//! - [`auth`]: typed payloads for each account lifecycle event
//! - [`EventPublisher`]: the port the application publishes through

pub mod auth;
pub mod event;
pub mod in_memory_publisher;
pub mod publisher;
pub mod routing;

pub use auth::{PasswordResetRequested, UserDeleted, UserLoggedIn, UserRegistered};
pub use event::{DomainEvent, EventError, IntegrationEvent};
pub use in_memory_publisher::InMemoryPublisher;
pub use publisher::EventPublisher;
pub use routing::{AuthRoutingKey, DOMAIN_EVENTS_EXCHANGE};
