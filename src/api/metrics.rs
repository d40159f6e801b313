//! Prometheus scrape endpoint.

use axum::extract::Extension;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use orderpulse_core::basic_credentials_match;

use super::error::ApiError;
use super::info::ServiceInfo;
use crate::server::config::MetricsConfig;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Who may scrape `/metrics`.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccess {
    username: String,
    password: String,
}

impl MetricsAccess {
    pub fn from_config(config: &MetricsConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn permits(&self, headers: &HeaderMap) -> bool {
        if self.username.is_empty() {
            return true;
        }
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| basic_credentials_match(v, &self.username, &self.password))
    }
}

/// Create metrics routes
pub fn metrics_routes() -> Router {
    Router::new().route("/metrics", get(metrics_endpoint))
}

async fn metrics_endpoint(
    Extension(service): Extension<ServiceInfo>,
    Extension(access): Extension<MetricsAccess>,
    headers: HeaderMap,
) -> Response {
    if !access.permits(&headers) {
        return (
            [(header::WWW_AUTHENTICATE, "Basic realm=\"metrics\"")],
            ApiError::unauthorized("metrics credentials required"),
        )
            .into_response();
    }
    (
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        service.metrics.export_prometheus(),
    )
        .into_response()
}
