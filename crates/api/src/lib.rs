//! Service wiring: configuration, startup and shutdown of the event publisher.

pub mod config;
pub mod context;
pub mod startup;

pub use config::AppConfig;
pub use context::ServiceContext;
pub use startup::{StartupError, shutdown, start};
