//! Retry logic with exponential backoff for transient API failures.
//!
//! When a request fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - 5xx responses, timeouts and transport errors
//! - [`FailureType::Permanent`] - any other non-success status or a bad URL
//! - [`FailureType::NeedsAuth`] - 401/403 or a bad token
//! - [`FailureType::RateLimited`] - the server answered 429
//!
//! Only transient failures are retried. A 429 means client-side throttling
//! already failed to keep us under the server's limit, so retrying blindly
//! would make it worse.
//!
//! # Example
//!
//! ```
//! use faostat_core::api::{ApiError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let unavailable = ApiError::http_status("https://example.com/en/data/QCL", 503, "");
//! let rejected = ApiError::rejected("https://example.com/en/data/QCL", 401, "");
//!
//! assert!(matches!(
//!     policy.should_retry(classify_error(&unavailable), 1),
//!     RetryDecision::Retry { attempt: 2, .. }
//! ));
//! assert!(matches!(
//!     policy.should_retry(classify_error(&rejected), 1),
//!     RetryDecision::DoNotRetry { .. }
//! ));
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::ApiError;

/// Default maximum attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default cap on a single backoff wait (10 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Classification of request failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Failure that won't succeed regardless of retries.
    Permanent,

    /// Authentication or authorization failure.
    NeedsAuth,

    /// Server-side rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the request.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 1 second
/// - `max_delay`: 10 seconds
/// - `backoff_multiplier`: 2.0
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay)
/// ```
///
/// With defaults the waits are 1s then 2s before the third and final attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay before the first retry.
    base_delay: Duration,

    /// Cap on any single delay.
    max_delay: Duration,

    /// Multiplier applied each attempt.
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Creates a policy that retries without waiting. Intended for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        let reason = match failure_type {
            FailureType::Transient if attempt < self.max_attempts => {
                return RetryDecision::Retry {
                    delay: self.delay_for(attempt),
                    attempt: attempt + 1,
                };
            }
            FailureType::Transient => {
                debug!(attempt, max = self.max_attempts, "retry budget spent");
                format!("all {} attempts used", self.max_attempts)
            }
            FailureType::Permanent => "the same request would fail the same way".to_string(),
            FailureType::NeedsAuth => "token rejected; retrying with it cannot succeed".to_string(),
            FailureType::RateLimited => "server is throttling; retrying would add load".to_string(),
        };
        RetryDecision::DoNotRetry { reason }
    }

    /// Backoff before the retry that follows failed `attempt`, capped at `max_delay`.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Classifies an API error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Auth (401, 403, bad token) | NeedsAuth |
/// | RateLimited (429) | RateLimited |
/// | HttpStatus 5xx | Transient |
/// | HttpStatus other | Permanent |
/// | Network, Timeout | Transient |
/// | InvalidUrl, Client | Permanent |
#[must_use]
pub fn classify_error(error: &ApiError) -> FailureType {
    match error {
        ApiError::Auth { .. } => FailureType::NeedsAuth,
        ApiError::RateLimited { .. } => FailureType::RateLimited,
        ApiError::HttpStatus { status, .. } if *status >= 500 => FailureType::Transient,
        ApiError::HttpStatus { .. } => FailureType::Permanent,
        ApiError::Network { .. } | ApiError::Timeout { .. } => FailureType::Transient,
        ApiError::InvalidUrl { .. } | ApiError::Client { .. } => FailureType::Permanent,
    }
}
