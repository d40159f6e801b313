//! Bearer token extractors for Axum
//!
//! The validator is shared through `Extension<Arc<dyn TokenValidator>>`.
//! Tokens are read from:
//! 1. `Authorization: Bearer <token>` header
//! 2. `?access_token=<token>` query parameter
//! 3. `?token=<token>` query parameter (browsers cannot set headers on WebSocket)

use axum::{extract::FromRequestParts, http::request::Parts};
use orderpulse_core::{AuthError, TokenValidator};
use std::sync::Arc;
use tracing::debug;

use crate::api::error::ApiError;

/// Shared validator handle.
pub type SharedValidator = Arc<dyn TokenValidator>;

/// Extractor that rejects the request with 401 unless a valid token is present.
#[derive(Debug)]
pub struct RequireSubject(pub String);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequireSubject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let validator = validator(parts)?;
        let token = extract_token(parts).ok_or(AuthError::MissingToken)?;
        let subject = validator.validate(&token)?;
        Ok(RequireSubject(subject))
    }
}

/// Extractor that never rejects: a valid token yields `Some(subject)`,
/// a missing or invalid one yields `None`.
#[derive(Debug)]
pub struct OptionalSubject(pub Option<String>);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for OptionalSubject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let validator = validator(parts)?;
        let Some(token) = extract_token(parts) else {
            return Ok(OptionalSubject(None));
        };
        match validator.validate(&token) {
            Ok(subject) => Ok(OptionalSubject(Some(subject))),
            Err(e) => {
                debug!(error = %e, "Ignoring invalid token on optional-auth route");
                Ok(OptionalSubject(None))
            }
        }
    }
}

fn validator(parts: &Parts) -> Result<SharedValidator, ApiError> {
    parts
        .extensions
        .get::<SharedValidator>()
        .cloned()
        .ok_or_else(|| ApiError::internal("token validator not configured"))
}

/// Pull a bearer token from the header or query string.
pub fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some((scheme, token)) = value.split_once(' ') {
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
                return Some(token.trim().to_string());
            }
        }
    }

    let query = parts.uri.query()?;
    let params: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    ["access_token", "token"].into_iter().find_map(|key| {
        params
            .iter()
            .find(|(name, value)| name == key && !value.is_empty())
            .map(|(_, value)| value.clone())
    })
}
