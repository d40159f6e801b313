//! WebSocket endpoint
//!
//! - /api/ws - order event push stream (token required)

pub mod events;

pub use events::events_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/api/ws", get(events_handler))
}
