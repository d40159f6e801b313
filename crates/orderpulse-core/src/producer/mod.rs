//! Event producers
//!
//! Everything that feeds the hub implements [`Producer`]: run until the
//! cancellation token fires, publishing decoded events as they arrive.
//! Producers never retry on their own; restarting a failed consumer is up to
//! whoever spawned it.

mod broker;
mod generator;
mod redis_source;

pub use broker::{BrokerConsumer, ChannelSource, MessageSource};
pub use generator::Generator;
pub use redis_source::RedisPubSubSource;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ProducerResult;
use crate::event_bus::Hub;

/// A long-running source of order events.
#[async_trait]
pub trait Producer: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Publish events into `hub` until `cancel` fires or the source fails.
    async fn run(&mut self, hub: Arc<Hub>, cancel: CancellationToken) -> ProducerResult<()>;
}
