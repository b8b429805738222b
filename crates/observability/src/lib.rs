//! Process-wide logging setup shared by the service binaries.

/// Logging configuration (filters, output format).
pub mod logging;

pub use logging::{LogFormat, init, init_with};
