//! Error types for the API module.
//!
//! This module defines structured errors for every outbound request, giving
//! the orchestrator enough context to classify, retry or report a failure.

use thiserror::Error;

/// Errors that can occur while talking to the statistics API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credential missing, expired, or rejected by the server (401/403).
    ///
    /// Never retried. The message is meant to be shown to the operator as-is.
    #[error("[AUTH] {message}\n  Suggestion: {suggestion}")]
    Auth {
        /// What went wrong with the credential.
        message: String,
        /// User-facing remediation hint.
        suggestion: &'static str,
    },

    /// The server answered 429 despite client-side throttling.
    #[error("HTTP 429 rate limit exceeded requesting {url}{}", body_suffix(body))]
    RateLimited {
        /// The URL that was rejected.
        url: String,
        /// Truncated response body, if any.
        body: String,
    },

    /// Non-success HTTP status other than auth and rate limiting.
    #[error("HTTP {status} requesting {url}{}", body_suffix(body))]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Truncated response body, if any.
        body: String,
    },

    /// Transport-level failure (DNS, connection refused, reset, TLS).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded the per-call timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The configured base URL and path do not form a valid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

const TOKEN_SUGGESTION: &str =
    "Log in again at the developer portal and update FAOSTAT_API_TOKEN in your .env file.";

impl ApiError {
    /// Creates an auth error for a missing token.
    #[must_use]
    pub fn missing_token() -> Self {
        Self::Auth {
            message: "FAOSTAT_API_TOKEN is not set".to_string(),
            suggestion: "Copy .env.example to .env and add your token.",
        }
    }

    /// Creates an auth error for a token whose `exp` claim is in the past.
    #[must_use]
    pub fn expired_token(seconds_ago: u64) -> Self {
        Self::Auth {
            message: format!("FAOSTAT_API_TOKEN expired {seconds_ago} seconds ago"),
            suggestion: TOKEN_SUGGESTION,
        }
    }

    /// Creates an auth error from a 401/403 response.
    pub fn rejected(url: impl Into<String>, status: u16, body: &str) -> Self {
        let reason = if status == 401 {
            "Unauthorized - invalid or expired API token"
        } else {
            "Forbidden - authentication failed"
        };
        Self::Auth {
            message: format!("HTTP {status} {reason} requesting {}{}", url.into(), body_suffix(body)),
            suggestion: TOKEN_SUGGESTION,
        }
    }

    /// Creates a rate-limited error from a 429 response.
    pub fn rate_limited(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::RateLimited {
            url: url.into(),
            body: body.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns true for credential failures.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
