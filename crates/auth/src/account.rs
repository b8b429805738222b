use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use authsvc_core::UserId;

/// Role name carried in account events.
///
/// Opaque at this layer; the account store decides which roles exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Role every self-registered account gets.
    pub const USER: Role = Role(Cow::Borrowed("user"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::USER
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The account fields every lifecycle event carries.
///
/// Taken by the caller from the committed record. For deletions it must be
/// captured before the row is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl AccountSnapshot {
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            email: email.into(),
            role,
        }
    }
}
