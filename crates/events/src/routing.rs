//! Exchange and routing key contract with downstream consumers.
//!
//! These strings are bound by consumers (e.g. the notification service) and
//! must not change.

/// Topic exchange every auth event is published to.
pub const DOMAIN_EVENTS_EXCHANGE: &str = "domain_events";

/// Routing keys for auth events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AuthRoutingKey {
    UserRegistered,
    UserLoggedIn,
    PasswordResetRequested,
    UserDeleted,
}

impl AuthRoutingKey {
    pub const ALL: [AuthRoutingKey; 4] = [
        AuthRoutingKey::UserRegistered,
        AuthRoutingKey::UserLoggedIn,
        AuthRoutingKey::PasswordResetRequested,
        AuthRoutingKey::UserDeleted,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AuthRoutingKey::UserRegistered => "auth.user.registered",
            AuthRoutingKey::UserLoggedIn => "auth.user.logged_in",
            AuthRoutingKey::PasswordResetRequested => "auth.password.reset_requested",
            AuthRoutingKey::UserDeleted => "auth.user.deleted",
        }
    }
}

impl core::fmt::Display for AuthRoutingKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for AuthRoutingKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
