//! Global request throttling for the statistics API.
//!
//! This module provides the [`RateLimiter`] struct which enforces a minimum
//! interval between *any* two requests issued through it, regardless of path.
//! The upstream API publishes a single account-wide limit, so there is one
//! dispatch clock rather than one per host.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use faostat_core::api::RateLimiter;
//!
//! # async fn example() {
//! // Two requests per second, shared by every client built from this handle
//! let limiter = Arc::new(RateLimiter::per_second(2));
//!
//! // First request proceeds immediately
//! limiter.acquire().await;
//!
//! // Second request waits until 500ms have passed since the first
//! limiter.acquire().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use super::constants::MAX_REQUESTS_PER_SECOND;

/// Minimum-interval rate limiter shared by all API callers.
///
/// Wrap it in `Arc` and hand a clone to every [`ApiClient`](super::ApiClient)
/// that must share the budget. The check-sleep-record sequence in
/// [`acquire`](Self::acquire) runs while holding a single `tokio::sync::Mutex`,
/// so no two permits are ever issued closer together than the interval.
/// Waiters are not guaranteed to be served in FIFO order.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two permits.
    min_interval: Duration,

    /// Whether throttling is disabled (tests and offline tooling).
    disabled: bool,

    /// Time of the last permitted dispatch; `None` until the first permit.
    last_dispatch: Mutex<Option<Instant>>,

    /// Total time callers spent waiting, in milliseconds.
    total_wait_ms: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_second(MAX_REQUESTS_PER_SECOND)
    }
}

impl RateLimiter {
    /// Creates a rate limiter with an explicit minimum interval between permits.
    #[must_use]
    #[instrument(skip_all, fields(interval_ms = min_interval.as_millis()))]
    pub fn new(min_interval: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            min_interval,
            disabled: false,
            last_dispatch: Mutex::new(None),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Creates a rate limiter allowing at most `requests` permits per second.
    ///
    /// A value of zero is treated as one request per second.
    #[must_use]
    pub fn per_second(requests: u32) -> Self {
        Self::new(Duration::from_secs(1) / requests.max(1))
    }

    /// Creates a disabled rate limiter that never delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            min_interval: Duration::ZERO,
            disabled: true,
            last_dispatch: Mutex::new(None),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether throttling is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the minimum interval between permits.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Returns the cumulative time callers have been delayed.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        Duration::from_millis(self.total_wait_ms.load(Ordering::Relaxed))
    }

    /// Waits until a request may be dispatched, then records the dispatch.
    ///
    /// Never fails; it only delays. The first call on a fresh limiter returns
    /// immediately.
    pub async fn acquire(&self) {
        if self.disabled {
            return;
        }

        // Held across the sleep: this is what serialises concurrent callers.
        let mut last_dispatch = self.last_dispatch.lock().await;

        if let Some(last) = *last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let delay = self.min_interval.saturating_sub(elapsed);
                #[allow(clippy::cast_possible_truncation)]
                self.total_wait_ms
                    .fetch_add(delay.as_millis() as u64, Ordering::Relaxed);
                trace!(delay_ms = delay.as_millis(), "throttling request");
                tokio::time::sleep(delay).await;
            }
        }

        *last_dispatch = Some(Instant::now());
    }
}
