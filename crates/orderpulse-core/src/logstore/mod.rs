//! Durable event log
//!
//! Cold replay tier: every published event is appended to a newline-delimited
//! JSON file. The file rotates by size and rotated siblings are swept by age.
//! Replay only scans the active file; older data lives in rotated files for
//! audit and offline tooling.

mod file;

pub use file::{FileLog, LogConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;

use crate::error::LogResult;
use crate::event::OrderEvent;

/// Append-only event storage with time-ordered replay.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist one event.
    async fn append(&self, event: &OrderEvent) -> LogResult<()>;

    /// Visit stored events with `ts > since` in storage order until the
    /// visitor returns `ControlFlow::Break`.
    async fn replay_since(
        &self,
        since: DateTime<Utc>,
        visit: &mut (dyn FnMut(OrderEvent) -> ControlFlow<()> + Send),
    ) -> LogResult<()>;

    /// Whether the backing storage is reachable (readiness probe).
    async fn health(&self) -> LogResult<()>;
}
