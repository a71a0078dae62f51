//! Rate-limited, retrying access to the statistics REST API.
//!
//! # Features
//!
//! - One global dispatch clock shared by every client ([`RateLimiter`])
//! - Bearer token checks before any request is sent
//! - Bounded exponential backoff for 5xx and transport failures ([`RetryPolicy`])
//! - Structured error types that separate auth, rate-limit and transient failures
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use faostat_core::api::{ApiClient, RateLimiter, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimiter::default());
//! let client = ApiClient::new("token", "https://api.example.org/v1", limiter, RetryPolicy::default())?;
//! let health = client.get("/ping", &[]).await?;
//! println!("{health}");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod rate_limiter;
mod retry;
pub mod token;

pub use client::ApiClient;
pub(crate) use client::truncate_chars;
pub use error::ApiError;
pub use rate_limiter::RateLimiter;
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use token::{TokenStatus, check_token};
