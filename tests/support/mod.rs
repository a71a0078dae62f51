//! Shared helpers for integration tests: mock API servers and test clients.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use faostat_core::{ApiClient, RateLimiter, RetryPolicy};
use serde_json::Value;
use wiremock::{Request, Respond, ResponseTemplate};

/// Token accepted by every mock server (not a JWT, so no expiry check applies).
pub const TEST_TOKEN: &str = "test-token";

/// Client against `base_url` with no throttling and zero-delay retries.
pub fn test_client(base_url: &str) -> ApiClient {
    test_client_with_attempts(base_url, 3)
}

/// Like [`test_client`] with an explicit attempt budget.
pub fn test_client_with_attempts(base_url: &str, max_attempts: u32) -> ApiClient {
    ApiClient::new(
        TEST_TOKEN,
        base_url,
        Arc::new(RateLimiter::disabled()),
        RetryPolicy::immediate(max_attempts),
    )
    .expect("test client should build")
}

/// Responds with `fail_status` for the first `fail_count` requests, then 200 with `body`.
pub struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
    fail_status: u16,
    body: Value,
}

impl FlakyResponder {
    /// Creates the responder and a handle to its request counter.
    pub fn new(fail_count: usize, fail_status: u16, body: Value) -> (Self, Arc<AtomicUsize>) {
        let request_count = Arc::new(AtomicUsize::new(0));
        let responder = Self {
            request_count: Arc::clone(&request_count),
            fail_count,
            fail_status,
            body,
        };
        (responder, request_count)
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(self.fail_status).set_body_string("upstream unavailable")
        } else {
            ResponseTemplate::new(200).set_body_json(self.body.clone())
        }
    }
}
