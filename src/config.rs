//! Client configuration.
//!
//! Settings for reaching the remote locker store. Values come from
//! [`LockerConfig::default`], a deserialized config file, or the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LockerError;

/// Environment variable holding the proxy base URL.
pub const ENV_API_URL: &str = "SEEDLOCKER_API_URL";

/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "SEEDLOCKER_TIMEOUT_SECS";

/// Ceiling on a stored value, in characters, as enforced by the proxy.
pub const DEFAULT_MAX_VALUE_LEN: usize = 500_000;

/// Configuration for the HTTP locker store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    /// Base URL of the validating proxy, without a trailing `/api`.
    pub api_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Largest value `set` will attempt to send.
    pub max_value_len: usize,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".to_string(),
            request_timeout_secs: 15,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
        }
    }
}

impl LockerConfig {
    /// Defaults overridden by `SEEDLOCKER_API_URL` and
    /// `SEEDLOCKER_TIMEOUT_SECS` when set.
    pub fn from_env() -> Result<Self, LockerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LockerError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| LockerError::InvalidConfig(format!("{ENV_TIMEOUT_SECS} is not a number")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the store client cannot work with.
    pub fn validate(&self) -> Result<(), LockerError> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LockerError::InvalidConfig(
                "api_url must be an http(s) URL".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(LockerError::InvalidConfig(
                "request_timeout_secs must be non-zero".into(),
            ));
        }
        if self.max_value_len == 0 {
            return Err(LockerError::InvalidConfig(
                "max_value_len must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
