//! Bearer-token payload inspection.
//!
//! The backend issues JWTs. The client never verifies signatures; it only
//! peeks at the payload to report expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

/// Decode the payload segment of a JWT. Returns `None` for anything that
/// isn't a three-part token with a base64url JSON payload.
pub fn parse_jwt(token: &str) -> Option<serde_json::Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The `exp` claim as a timestamp, if present and numeric.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp = parse_jwt(token)?.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

/// Tokens without a readable `exp` claim count as expired.
pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    match expires_at(token) {
        Some(exp) => now >= exp,
        None => true,
    }
}
