//! `authsvc-core` — identity and error primitives shared by every crate.
//!
//! Pure domain code only (no IO, no async).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
