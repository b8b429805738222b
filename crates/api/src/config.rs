//! Service configuration, read once at process start.

use std::time::Duration;

use authsvc_auth::{DEFAULT_RESET_BASE_URL, DEFAULT_RESET_TTL, ResetLinkPolicy};
use authsvc_infra::{ConfigError, PublisherConfig};

pub const ENV_RESET_BASE_URL: &str = "PASSWORD_RESET_BASE_URL";
pub const ENV_RESET_TTL_SECS: &str = "PASSWORD_RESET_TTL_SECS";
pub const ENV_REQUIRE_BROKER: &str = "REQUIRE_BROKER_AT_STARTUP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub publisher: PublisherConfig,
    pub reset: ResetLinkPolicy,
    /// Abort startup when the first broker connect fails.
    pub require_broker_at_startup: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let publisher = PublisherConfig::from_lookup(&lookup)?;

        let base_url = lookup(ENV_RESET_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESET_BASE_URL.to_string());
        let ttl = match lookup(ENV_RESET_TTL_SECS) {
            Some(raw) => parse_secs(ENV_RESET_TTL_SECS, &raw)?,
            None => DEFAULT_RESET_TTL,
        };
        let reset = ResetLinkPolicy::new(base_url.clone(), ttl).map_err(|e| ConfigError::Invalid {
            key: ENV_RESET_BASE_URL,
            value: base_url,
            reason: e.to_string(),
        })?;

        let require_broker_at_startup = match lookup(ENV_REQUIRE_BROKER) {
            Some(raw) => parse_flag(ENV_REQUIRE_BROKER, &raw)?,
            None => false,
        };

        Ok(Self {
            publisher,
            reset,
            require_broker_at_startup,
        })
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
