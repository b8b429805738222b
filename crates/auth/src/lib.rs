//! `authsvc-auth` — account lifecycle announcements.
//!
//! Decoupled from HTTP and storage: callers commit the account change
//! themselves and hand the committed snapshot to [`AccountEvents`].

pub mod account;
pub mod lifecycle;
pub mod outcome;
pub mod reset;

pub use account::{AccountSnapshot, Role};
pub use lifecycle::{AccountEvent, AccountEvents};
pub use outcome::{ActionOutcome, EventDelivery};
pub use reset::{DEFAULT_RESET_BASE_URL, DEFAULT_RESET_TTL, ResetLink, ResetLinkPolicy};
