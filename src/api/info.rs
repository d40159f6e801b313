//! Service description endpoint.

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use orderpulse_core::{HubMetrics, HubStats};
use serde::Serialize;
use std::sync::Arc;

/// Static facts about the running service, shared via `Extension`.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub allowed_origins: Vec<String>,
    pub redis_enabled: bool,
    pub metrics: Arc<HubMetrics>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub ws: &'static str,
    pub sse: &'static str,
    pub origins: Vec<String>,
    pub redis: bool,
    pub stats: HubStats,
}

/// Create info routes
pub fn info_routes() -> Router {
    Router::new().route("/api/info", get(info))
}

async fn info(Extension(service): Extension<ServiceInfo>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        ws: "/api/ws",
        sse: "/api/stream/events",
        origins: service.allowed_origins,
        redis: service.redis_enabled,
        stats: service.metrics.snapshot(),
    })
}
