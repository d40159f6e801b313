//! Liveness and readiness probes.
//!
//! - `/healthz`: process is up
//! - `/readyz`: durable log (when attached) is reachable

use axum::extract::Extension;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::warn;

use super::error::ApiError;
use orderpulse_core::Hub;

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(Extension(hub): Extension<Arc<Hub>>) -> Result<&'static str, ApiError> {
    if let Some(store) = hub.store() {
        if let Err(e) = store.health().await {
            warn!(error = %e, "Readiness check failed");
            return Err(ApiError::unavailable(format!("event log unavailable: {e}")));
        }
    }
    Ok("ok")
}
