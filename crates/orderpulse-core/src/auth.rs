//! Bearer token validation
//!
//! The transports only need `validate(token) -> subject`. [`JwtValidator`]
//! checks HS256-signed JWTs against a set of shared secrets keyed by `kid`.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// Subject reported when no signing keys are configured or the token has no `sub`.
pub const ANONYMOUS_SUBJECT: &str = "anon";

/// Turns a bearer token into an authenticated subject.
pub trait TokenValidator: Send + Sync {
    /// Validate `token` and return its subject.
    fn validate(&self, token: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// HS256 JWT validator.
///
/// - empty token: always rejected
/// - no keys configured: any non-empty token maps to [`ANONYMOUS_SUBJECT`]
/// - `kid` header selects the key; without `kid` a single configured key is used
/// - `exp`, `nbf` and `iat` are checked with `skew` leeway
pub struct JwtValidator {
    keys: HashMap<String, Vec<u8>>,
    skew: Duration,
}

impl JwtValidator {
    /// Validator over `kid -> secret` pairs.
    pub fn new(keys: HashMap<String, String>, skew: Duration) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|(kid, secret)| (kid, secret.into_bytes()))
                .collect(),
            skew,
        }
    }

    /// True when tokens are only checked for presence.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.keys.is_empty()
    }

    fn key_for(&self, kid: Option<&str>) -> Result<&[u8], AuthError> {
        match kid {
            Some(kid) if !kid.is_empty() => self
                .keys
                .get(kid)
                .map(Vec::as_slice)
                .ok_or_else(|| AuthError::UnknownKey(kid.to_string())),
            _ if self.keys.len() == 1 => self
                .keys
                .values()
                .next()
                .map(Vec::as_slice)
                .ok_or(AuthError::InvalidToken),
            _ => Err(AuthError::UnknownKey(String::new())),
        }
    }

    fn check_time_claims(&self, claims: &Value, now: i64) -> Result<(), AuthError> {
        let skew = self.skew.as_secs() as i64;
        if let Some(exp) = claims.get("exp").and_then(claim_secs) {
            if now > exp.saturating_add(skew) {
                return Err(AuthError::Expired);
            }
        }
        if let Some(nbf) = claims.get("nbf").and_then(claim_secs) {
            if now.saturating_add(skew) < nbf {
                return Err(AuthError::NotYetValid);
            }
        }
        if let Some(iat) = claims.get("iat").and_then(claim_secs) {
            if now < iat.saturating_sub(skew) {
                return Err(AuthError::IssuedInFuture);
            }
        }
        Ok(())
    }
}

impl TokenValidator for JwtValidator {
    fn validate(&self, token: &str) -> Result<String, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if self.is_open() {
            return Ok(ANONYMOUS_SUBJECT.to_string());
        }

        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken);
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(AuthError::InvalidToken);
        }
        let key = self.key_for(header.kid.as_deref())?;

        let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| AuthError::InvalidToken)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        let expected = mac.finalize().into_bytes();
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        if !bool::from(expected.as_slice().ct_eq(&signature)) {
            return Err(AuthError::InvalidToken);
        }

        let claims: Value = decode_segment(claims_b64)?;
        self.check_time_claims(&claims, Utc::now().timestamp())?;

        Ok(claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS_SUBJECT)
            .to_string())
    }
}

/// Check an `Authorization: Basic ..` header value against fixed credentials.
///
/// Both halves are compared in constant time.
#[must_use]
pub fn basic_credentials_match(header: &str, username: &str, password: &str) -> bool {
    let Some((scheme, encoded)) = header.trim().split_once(' ') else {
        return false;
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return false;
    }
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Some(split) = decoded.iter().position(|b| *b == b':') else {
        return false;
    };
    let (user, pass) = (&decoded[..split], &decoded[split + 1..]);
    let user_ok = user.ct_eq(username.as_bytes());
    let pass_ok = pass.ct_eq(password.as_bytes());
    bool::from(user_ok & pass_ok)
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}

/// Numeric dates are Unix seconds; RFC3339 strings are accepted too.
fn claim_secs(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc).timestamp()),
        _ => None,
    }
}
