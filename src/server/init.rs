//! Server initialization
//!
//! Contains the main `run()` function that wires the hub, durable log,
//! producers and HTTP surface together.

use anyhow::{Context, Result};
use axum::{Extension, Router};
use orderpulse_core::{
    shutdown_signal_with_controller, FileLog, Hub, HubMetrics, JwtValidator, ShutdownController,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::config::AppConfig;
use super::loader::load_config;
use super::producers::start_producers;
use crate::api::{api_router, MetricsAccess, ServiceInfo};
use crate::middleware::auth::SharedValidator;
use crate::middleware::headers::{cors_layer, with_secure_headers};
use crate::stream::{sse_routes, StreamContext};
use crate::websocket::websocket_router;

/// Run the server
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    info!("Starting OrderPulse v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(config_path).context("Failed to load configuration")?;
    info!("Configuration loaded");

    let shutdown_controller = ShutdownController::new();
    let metrics = Arc::new(HubMetrics::new());
    let hub = build_hub(&config, metrics.clone()).await?;

    let producer_handles = start_producers(&config, &hub, &shutdown_controller);

    let validator: SharedValidator = Arc::new(JwtValidator::new(
        config.auth.keys.clone(),
        Duration::from_secs(config.auth.skew_secs),
    ));
    let app = build_router(
        &config,
        hub,
        metrics,
        validator,
        shutdown_controller.token(),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    let server_shutdown = shutdown_controller.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_controller(server_shutdown))
        .await
        .context("HTTP server error");

    // no-op after a signal; covers the server failing on its own
    shutdown_controller.shutdown().await;

    info!("Waiting for producers to finish...");
    for handle in producer_handles {
        match tokio::time::timeout(Duration::from_secs(5), handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Producer task error: {}", e),
            Err(_) => warn!("Producer shutdown timeout"),
        }
    }

    served?;
    info!("OrderPulse shutdown complete");
    Ok(())
}

/// Hub with the history buffer and durable log the config asks for.
pub async fn build_hub(config: &AppConfig, metrics: Arc<HubMetrics>) -> Result<Arc<Hub>> {
    let mut builder = Hub::builder().observer(metrics);

    if config.history.enabled {
        builder = builder.history(
            config.history.max_events,
            Duration::from_secs(config.history.ttl_secs),
        );
        info!(
            max_events = config.history.max_events,
            ttl_secs = config.history.ttl_secs,
            "History buffer enabled"
        );
    }

    if config.log.enabled {
        let log = FileLog::open(config.log.to_store_config())
            .await
            .with_context(|| format!("Failed to open event log at {}", config.log.path.display()))?;
        info!(path = %config.log.path.display(), "Durable event log enabled");
        builder = builder.store(Arc::new(log));
    }

    Ok(builder.build())
}

/// Full HTTP surface: probes, info, metrics, telemetry, SSE and WebSocket,
/// wrapped in CORS, security headers and request tracing.
pub fn build_router(
    config: &AppConfig,
    hub: Arc<Hub>,
    metrics: Arc<HubMetrics>,
    validator: SharedValidator,
    shutdown: CancellationToken,
) -> Router {
    let stream_context = StreamContext {
        hub: hub.clone(),
        config: config.stream.clone(),
        allowed_origins: config.server.allowed_origins.clone().into(),
        shutdown,
    };
    let service_info = ServiceInfo {
        allowed_origins: config.server.allowed_origins.clone(),
        redis_enabled: config.redis.enabled,
        metrics,
    };

    let app = Router::new()
        .merge(api_router())
        .merge(sse_routes())
        .merge(websocket_router())
        .layer(Extension(hub))
        .layer(Extension(stream_context))
        .layer(Extension(service_info))
        .layer(Extension(MetricsAccess::from_config(&config.metrics)))
        .layer(Extension(validator))
        .layer(cors_layer(&config.server.allowed_origins))
        .layer(TraceLayer::new_for_http());

    with_secure_headers(app)
}
