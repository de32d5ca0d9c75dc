//! Bearer token handling.
//!
//! AKSes issues JWTs. The client never holds the signing secret, so tokens
//! are decoded without signature verification purely to read the `exp`
//! claim; trust is left to the issuing server and TLS.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token contains an invalid number of segments: {0}")]
    Segments(usize),

    #[error("could not base64-decode token {segment}: {message}")]
    Encoding { segment: &'static str, message: String },

    #[error("token {segment} is not a JSON object")]
    NotAnObject { segment: &'static str },

    #[error("cannot find exp claim in the token")]
    MissingExpiry,

    #[error("exp claim invalid")]
    InvalidExpiry,
}

/// An opaque bearer token as issued by the login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expiry instant, recomputed from the claims on every call.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        parse_expiry(&self.0)
    }

    /// A token expiring exactly at `now` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Result<bool, TokenError> {
        Ok(self.expires_at()? <= now)
    }
}

// Never print token material.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Map<String, Value>, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| TokenError::Encoding {
            segment: name,
            message: e.to_string(),
        })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(TokenError::NotAnObject { segment: name }),
    }
}

/// Read the `exp` claim of a three-part JWT without verifying its signature.
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, TokenError> {
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Segments(parts.len()));
    }

    decode_segment(parts[0], "header")?;
    let claims = decode_segment(parts[1], "claims")?;

    let exp = claims.get("exp").ok_or(TokenError::MissingExpiry)?;
    let secs = exp.as_f64().ok_or(TokenError::InvalidExpiry)?;
    if !secs.is_finite() {
        return Err(TokenError::InvalidExpiry);
    }

    DateTime::from_timestamp(secs.trunc() as i64, 0).ok_or(TokenError::InvalidExpiry)
}
