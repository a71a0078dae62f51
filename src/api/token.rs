//! Bearer token inspection.
//!
//! The API issues JWTs. We never verify signatures (the server does that); we
//! only read the `exp` claim so an expired token fails before any network call
//! and a nearly-expired one produces a warning. Tokens that are not decodable
//! JWTs are passed through unchecked.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::warn;

use super::ApiError;
use super::constants::TOKEN_EXPIRY_WARNING;

/// Result of inspecting a bearer token's expiry claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Not a decodable JWT, or no `exp` claim; nothing to check.
    Unchecked,
    /// Expiry is comfortably in the future.
    Valid {
        /// Time left before the token expires.
        remaining: Duration,
    },
    /// Less than the warning threshold remains.
    ExpiringSoon {
        /// Time left before the token expires.
        remaining: Duration,
    },
}

/// Validates a token against the current wall clock.
///
/// # Errors
///
/// Returns [`ApiError::Auth`] if the token is empty or already expired.
pub fn check_token(token: &str) -> Result<TokenStatus, ApiError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64());
    let status = check_token_at(token, now)?;
    if let TokenStatus::ExpiringSoon { remaining } = status {
        warn!(
            remaining_secs = remaining.as_secs(),
            remaining_mins = remaining.as_secs() / 60,
            "FAOSTAT_API_TOKEN expires soon; consider refreshing it"
        );
    }
    Ok(status)
}

/// Validates a token against an explicit Unix time in seconds.
///
/// # Errors
///
/// Returns [`ApiError::Auth`] if the token is empty or expired at `now_secs`.
pub fn check_token_at(token: &str, now_secs: f64) -> Result<TokenStatus, ApiError> {
    if token.trim().is_empty() {
        return Err(ApiError::missing_token());
    }

    let Some(exp) = expiry_claim(token) else {
        return Ok(TokenStatus::Unchecked);
    };

    let remaining = exp - now_secs;
    if remaining <= 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return Err(ApiError::expired_token(remaining.abs() as u64));
    }

    // an `exp` too far ahead for a Duration is as good as never expiring
    let remaining = Duration::try_from_secs_f64(remaining).unwrap_or(Duration::MAX);
    if remaining < TOKEN_EXPIRY_WARNING {
        Ok(TokenStatus::ExpiringSoon { remaining })
    } else {
        Ok(TokenStatus::Valid { remaining })
    }
}

/// Reads the `exp` claim from a JWT payload segment.
fn expiry_claim(token: &str) -> Option<f64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_f64().filter(|exp| exp.is_finite())
}
