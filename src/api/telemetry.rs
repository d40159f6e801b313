//! Client telemetry intake
//!
//! Authenticated clients post small diagnostic records. Credentials that leak
//! into the message or tags (bearer tokens, API keys, `token=..` pairs) are
//! masked before the record reaches the logs.

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::info;

use super::error::ApiError;
use crate::middleware::auth::RequireSubject;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const REDACTED: &str = "***redacted***";

static SECRET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(bearer\s+[A-Za-z0-9._-]+|api[-_]?key\s*[=:]\s*[A-Za-z0-9._-]+|token\s*[=:]\s*[A-Za-z0-9._-]+)",
    )
    .expect("secret pattern is a valid regex")
});

/// One client-side diagnostic record.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryPayload {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
}

impl TelemetryPayload {
    fn redact(&mut self) {
        self.message = mask(&self.message);
        for value in self.tags.values_mut() {
            *value = mask(value);
        }
    }
}

fn mask(text: &str) -> String {
    SECRET_PATTERN.replace_all(text, REDACTED).into_owned()
}

/// Create telemetry routes
pub fn telemetry_routes() -> Router {
    Router::new()
        .route("/api/telemetry", post(ingest))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

async fn ingest(
    RequireSubject(subject): RequireSubject,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let mut payload: TelemetryPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("bad json: {e}")))?;
    payload.redact();
    let ts = payload.ts.unwrap_or_else(Utc::now);

    info!(
        subject = %subject,
        kind = %payload.kind,
        message = %payload.message,
        tags = ?payload.tags,
        %ts,
        "Client telemetry"
    );
    Ok(Json(json!({ "ok": true })))
}
