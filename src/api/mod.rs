//! HTTP API
//!
//! - `/healthz`, `/readyz` probes
//! - `/api/info` service description and hub statistics
//! - `/metrics` Prometheus scrape, optionally behind basic auth
//! - `/api/telemetry` authenticated client diagnostics with secret masking
//! - JSON error type shared by every handler

pub mod error;
pub mod health;
pub mod info;
pub mod metrics;
pub mod telemetry;

use axum::Router;

pub use health::health_routes;
pub use info::{info_routes, ServiceInfo};
pub use metrics::{metrics_routes, MetricsAccess};
pub use telemetry::telemetry_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(health_routes())
        .merge(info_routes())
        .merge(metrics_routes())
        .merge(telemetry_routes())
}
