//! Environment-backed client configuration.
//!
//! Values come from the process environment, after an optional `.env` file in
//! the working directory has been loaded:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `FAOSTAT_API_TOKEN` | *(none; the client refuses to start without it)* |
//! | `FAOSTAT_BASE_URL` | `https://api-faostat.dev.fao.org/api/v1` |
//! | `FAOSTAT_TIMEOUT_SECS` | `60` |

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::api::constants::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};

/// Environment variable holding the bearer token.
pub const TOKEN_VAR: &str = "FAOSTAT_API_TOKEN";
/// Environment variable overriding the API base URL.
pub const BASE_URL_VAR: &str = "FAOSTAT_BASE_URL";
/// Environment variable overriding the per-request timeout.
pub const TIMEOUT_VAR: &str = "FAOSTAT_TIMEOUT_SECS";

/// Errors raised while reading configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The timeout override is not a whole number in range.
    #[error("invalid value for {TIMEOUT_VAR}: {value:?}. Expected whole seconds in 1..=3600")]
    InvalidTimeout {
        /// The raw value found in the environment.
        value: String,
    },
}

/// Connection settings for [`ApiClient`](crate::api::ApiClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token; may be empty here, the client rejects it at construction.
    pub token: String,
    /// API base URL without a trailing slash.
    pub base_url: String,
    /// Ceiling applied to each HTTP request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Loads `.env` (if present) and reads the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup(TOKEN_VAR).unwrap_or_default().trim().to_string();
        let base_url = lookup(BASE_URL_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let request_timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => parse_timeout(&raw)?,
            None => Duration::from_secs(REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            token,
            base_url,
            request_timeout,
        })
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if (1..=3600).contains(&secs) => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout {
            value: raw.to_string(),
        }),
    }
}
