//! Constants for the API module (endpoint, timeouts, throttling, token checks).

use std::time::Duration;

/// Default API base URL, used when `FAOSTAT_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://api-faostat.dev.fao.org/api/v1";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Per-request ceiling covering connect, send and body read (60 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum requests per second permitted by the upstream API.
pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

/// Tokens with less than this much lifetime left trigger a warning (10 minutes).
pub const TOKEN_EXPIRY_WARNING: Duration = Duration::from_secs(600);

/// Maximum characters of a response body carried in error messages.
pub const ERROR_BODY_PREVIEW_CHARS: usize = 500;
