//! Authenticated, throttled, retrying JSON client for the statistics API.
//!
//! Every request goes through the shared [`RateLimiter`] (including retries),
//! carries the bearer token, and is retried according to the client's
//! [`RetryPolicy`] when the failure is transient.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, ERROR_BODY_PREVIEW_CHARS, REQUEST_TIMEOUT_SECS};
use super::error::ApiError;
use super::rate_limiter::RateLimiter;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::token::check_token;
use crate::config::ClientConfig;

/// HTTP client for the statistics API.
///
/// Create it once and reuse it; clones share the connection pool and the
/// rate limiter.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use faostat_core::api::{ApiClient, RateLimiter, RetryPolicy};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(
///     "my-token",
///     "https://api-faostat.dev.fao.org/api/v1",
///     Arc::new(RateLimiter::default()),
///     RetryPolicy::default(),
/// )?;
/// let groups = client.get("/en/groups/", &[]).await?;
/// println!("{groups}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl ApiClient {
    /// Creates a client with the default request timeout.
    ///
    /// No network call is made. The token is checked first: an empty or
    /// expired token fails immediately, and a token close to expiry logs a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] for a missing, expired or malformed token,
    /// [`ApiError::InvalidUrl`] for an unparseable base URL, and
    /// [`ApiError::Client`] if the HTTP client cannot be built.
    pub fn new(
        token: &str,
        base_url: &str,
        rate_limiter: Arc<RateLimiter>,
        retry_policy: RetryPolicy,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(
            token,
            base_url,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            rate_limiter,
            retry_policy,
        )
    }

    /// Creates a client from loaded configuration, with the default retry policy.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::new`].
    pub fn from_config(
        config: &ClientConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(
            &config.token,
            &config.base_url,
            config.request_timeout,
            rate_limiter,
            RetryPolicy::default(),
        )
    }

    /// Creates a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::new`].
    #[instrument(level = "debug", skip(token, rate_limiter, retry_policy))]
    pub fn with_timeout(
        token: &str,
        base_url: &str,
        request_timeout: Duration,
        rate_limiter: Arc<RateLimiter>,
        retry_policy: RetryPolicy,
    ) -> Result<Self, ApiError> {
        check_token(token)?;

        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if Url::parse(&base_url).is_err() {
            return Err(ApiError::invalid_url(base_url));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| {
            ApiError::Auth {
                message: "FAOSTAT_API_TOKEN contains characters not allowed in a header"
                    .to_string(),
                suggestion: "Check the token for stray whitespace or quotes in your .env file.",
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .gzip(true)
            .build()
            .map_err(|source| ApiError::Client { source })?;

        Ok(Self {
            client,
            base_url,
            rate_limiter,
            retry_policy,
        })
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the retry policy applied to every request.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Sends a GET request and returns the decoded JSON payload.
    ///
    /// # Errors
    ///
    /// Returns the final [`ApiError`] once retries (if any) are exhausted.
    #[instrument(skip(self, params), fields(path = %path))]
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let mut url = self.resolve(path)?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(key, value)| (*key, value.as_str())));
        }
        self.execute(Method::GET, &url, None).await
    }

    /// Sends a POST request with a JSON body and returns the decoded payload.
    ///
    /// # Errors
    ///
    /// Returns the final [`ApiError`] once retries (if any) are exhausted.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = self.resolve(path)?;
        self.execute(Method::POST, &url, Some(body)).await
    }

    fn resolve(&self, path: &str) -> Result<Url, ApiError> {
        let joined = if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        };
        Url::parse(&joined).map_err(|_| ApiError::invalid_url(joined))
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.rate_limiter.acquire().await;

            match self.send_once(method.clone(), url, body).await {
                Ok(payload) => return Ok(payload),
                Err(error) => match self
                    .retry_policy
                    .should_retry(classify_error(&error), attempt)
                {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        warn!(
                            url = %url,
                            attempt = next_attempt,
                            max_attempts = self.retry_policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url = %url, attempt, %reason, "not retrying request");
                        return Err(error);
                    }
                },
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url.as_str(), e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("no content-type")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(url.as_str(), e))?;

        debug!(
            %method,
            path = url.path(),
            status,
            bytes = bytes.len(),
            content_type = %content_type,
            "response received"
        );

        if !(200..300).contains(&status) {
            return Err(status_error(url.as_str(), status, &bytes));
        }

        Ok(decode_body(status, &bytes, url))
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::timeout(url)
    } else {
        ApiError::network(url, error)
    }
}

fn status_error(url: &str, status: u16, body: &[u8]) -> ApiError {
    let preview = body_preview(body);
    match status {
        401 | 403 => ApiError::rejected(url, status, &preview),
        429 => ApiError::rate_limited(url, preview),
        _ => ApiError::http_status(url, status, preview),
    }
}

/// Decodes a 2xx body, degrading to a status descriptor instead of failing.
fn decode_body(status: u16, body: &[u8], url: &Url) -> Value {
    if body.is_empty() {
        return json!({ "status": status });
    }
    match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(_) => {
            let text = String::from_utf8_lossy(body).into_owned();
            warn!(
                path = url.path(),
                preview = %truncate_chars(&text, ERROR_BODY_PREVIEW_CHARS),
                "non-JSON response body"
            );
            json!({ "status": status, "text": text })
        }
    }
}

fn body_preview(body: &[u8]) -> String {
    truncate_chars(String::from_utf8_lossy(body).trim(), ERROR_BODY_PREVIEW_CHARS)
}

/// Truncates on a character boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(
            "token",
            base_url,
            Arc::new(RateLimiter::disabled()),
            RetryPolicy::immediate(3),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_missing_token() {
        let err = ApiClient::new(
            "",
            "https://api.test/v1",
            Arc::new(RateLimiter::disabled()),
            RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let err = ApiClient::new(
            "token",
            "not a url",
            Arc::new(RateLimiter::disabled()),
            RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }

    #[test]
    fn test_new_rejects_token_with_newline() {
        let err = ApiClient::new(
            "abc\ndef",
            "https://api.test/v1",
            Arc::new(RateLimiter::disabled()),
            RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn test_resolve_keeps_base_path() {
        let client = client("https://api.test/api/v1/");
        assert_eq!(client.base_url(), "https://api.test/api/v1");
        assert_eq!(
            client.resolve("/en/data/QCL").unwrap().as_str(),
            "https://api.test/api/v1/en/data/QCL"
        );
        assert_eq!(
            client.resolve("ping").unwrap().as_str(),
            "https://api.test/api/v1/ping"
        );
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(status_error("u", 401, b"").is_auth());
        assert!(status_error("u", 403, b"").is_auth());
        assert!(matches!(
            status_error("u", 429, b"busy"),
            ApiError::RateLimited { .. }
        ));
        assert!(matches!(
            status_error("u", 502, b""),
            ApiError::HttpStatus { status: 502, .. }
        ));
    }

    #[test]
    fn test_status_error_truncates_body() {
        let body = "x".repeat(2_000);
        match status_error("u", 500, body.as_bytes()) {
            ApiError::HttpStatus { body, .. } => assert_eq!(body.len(), 500),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_body_variants() {
        let url = Url::parse("https://api.test/ping").unwrap();
        assert_eq!(decode_body(204, b"", &url), json!({"status": 204}));
        assert_eq!(decode_body(200, br#"[1,2]"#, &url), json!([1, 2]));
        assert_eq!(
            decode_body(200, b"<html>ok</html>", &url),
            json!({"status": 200, "text": "<html>ok</html>"})
        );
    }

    #[test]
    fn test_truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }
}
