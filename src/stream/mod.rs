//! Stream transports
//!
//! SSE lives here; the WebSocket handler is in `crate::websocket`. Both share
//! [`StreamContext`] (hub, transport settings, origin policy, shutdown token)
//! and the query controls parsed by [`StreamQuery`].

pub mod cursor;
pub mod filter;
pub mod sse;

use orderpulse_core::Hub;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::server::config::StreamConfig;

pub use filter::EventFilter;
pub use sse::sse_routes;

/// Everything a stream handler needs, shared via `Extension<StreamContext>`.
#[derive(Clone)]
pub struct StreamContext {
    pub hub: Arc<Hub>,
    pub config: StreamConfig,
    pub allowed_origins: Arc<[String]>,
    /// Parent of every per-connection token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

/// Query controls accepted by both transports. Token parameters are read by
/// the auth extractors and ignored here.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub since: Option<String>,
    pub types: Option<String>,
    pub statuses: Option<String>,
}

impl StreamQuery {
    pub fn filter(&self) -> EventFilter {
        EventFilter::from_query(self.types.as_deref(), self.statuses.as_deref())
    }
}
