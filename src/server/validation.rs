//! Startup configuration checks

use super::config::AppConfig;
use anyhow::{bail, Result};
use tracing::warn;

/// Reject configurations the server cannot run with; warn about risky ones.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.stream.sse_buffer == 0 || config.stream.ws_buffer == 0 {
        bail!("stream.sse_buffer and stream.ws_buffer must be greater than zero");
    }
    if config.stream.keepalive_secs == 0 || config.stream.ws_ping_secs == 0 {
        bail!("stream.keepalive_secs and stream.ws_ping_secs must be greater than zero");
    }
    if config.history.enabled && config.history.max_events == 0 {
        bail!("history.max_events must be greater than zero");
    }
    if config.log.enabled && config.log.max_bytes == 0 {
        bail!("log.max_bytes must be greater than zero");
    }
    if config.generator.enabled && config.generator.tick_ms == 0 {
        bail!("generator.tick_ms must be greater than zero");
    }

    if !config.metrics.username.is_empty() && config.metrics.password.is_empty() {
        bail!("metrics.password must be set when metrics.username is");
    }

    if config.server.allowed_origins.iter().any(|o| o == "*") {
        warn!("allowed_origins contains \"*\": any browser origin may connect");
    }
    if config.auth.keys.is_empty() {
        warn!("No auth keys configured: any non-empty bearer token is accepted");
    }
    if config.metrics.username.is_empty() {
        warn!("No metrics credentials configured: /metrics is unauthenticated");
    }
    Ok(())
}
