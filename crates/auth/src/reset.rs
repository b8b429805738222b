//! Password reset links.
//!
//! A link is `{base_url}/reset-password?token={token}` where the token is 32
//! random bytes, hex encoded. Storing the token and checking its expiry is
//! the account store's job; this module only mints links.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;

use authsvc_core::{DomainError, DomainResult};

pub const DEFAULT_RESET_BASE_URL: &str = "http://localhost:3001";

/// Reset links expire after 10 minutes unless configured otherwise.
pub const DEFAULT_RESET_TTL: Duration = Duration::from_secs(10 * 60);

const TOKEN_BYTES: usize = 32;

/// Where reset links point and how long they stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetLinkPolicy {
    base_url: String,
    ttl: TimeDelta,
}

impl Default for ResetLinkPolicy {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RESET_BASE_URL.to_string(),
            ttl: TimeDelta::seconds(DEFAULT_RESET_TTL.as_secs() as i64),
        }
    }
}

impl ResetLinkPolicy {
    pub fn new(base_url: impl Into<String>, ttl: Duration) -> DomainResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(DomainError::validation("reset base url must not be empty"));
        }
        if ttl.is_zero() {
            return Err(DomainError::validation("reset link ttl must be positive"));
        }
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|_| DomainError::validation("reset link ttl is out of range"))?;

        Ok(Self { base_url, ttl })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Mint a link with a fresh random token.
    pub fn issue(&self, now: DateTime<Utc>) -> ResetLink {
        self.link_for(generate_token(), now)
    }

    /// Build the link for an existing token.
    pub fn link_for(&self, token: impl Into<String>, now: DateTime<Utc>) -> ResetLink {
        let token = token.into();
        ResetLink {
            url: format!("{}/reset-password?token={}", self.base_url, token),
            expires_at: now + self.ttl,
            token,
        }
    }
}

/// A minted reset link.
#[derive(Clone, PartialEq, Eq)]
pub struct ResetLink {
    pub token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl core::fmt::Debug for ResetLink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // The token grants a password change.
        f.debug_struct("ResetLink")
            .field("token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl ResetLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn default_policy_expires_after_ten_minutes() {
        let link = ResetLinkPolicy::default().link_for("abc", noon());

        assert_eq!(link.url, "http://localhost:3001/reset-password?token=abc");
        assert_eq!(link.expires_at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap());
        assert!(!link.is_expired(noon() + TimeDelta::minutes(10)));
        assert!(link.is_expired(noon() + TimeDelta::minutes(11)));
    }

    #[test]
    fn issued_tokens_are_64_hex_chars_and_unique() {
        let policy = ResetLinkPolicy::default();
        let a = policy.issue(noon());
        let b = policy.issue(noon());

        assert_eq!(a.token.len(), 64);
        assert!(a.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.token, b.token);
        assert!(a.url.ends_with(&a.token));
    }

    #[test]
    fn rejects_empty_base_url_and_zero_ttl() {
        assert!(ResetLinkPolicy::new("  ", DEFAULT_RESET_TTL).is_err());
        assert!(ResetLinkPolicy::new("https://app", Duration::ZERO).is_err());
    }

    #[test]
    fn debug_hides_the_token() {
        let link = ResetLinkPolicy::default().link_for("s3cret", noon());
        assert!(!format!("{link:?}").contains("s3cret"));
    }

    proptest! {
        /// Property: trailing slashes on the base never produce `//reset-password`.
        #[test]
        fn url_is_base_plus_path(host in "[a-z]{1,12}", slashes in 0usize..3) {
            let base = format!("https://{host}.example{}", "/".repeat(slashes));
            let policy = ResetLinkPolicy::new(base, DEFAULT_RESET_TTL).unwrap();
            let link = policy.link_for("t0k", noon());

            prop_assert_eq!(
                link.url,
                format!("https://{host}.example/reset-password?token=t0k")
            );
        }
    }
}
