use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Producer;
use crate::error::{ProducerError, ProducerResult};
use crate::event::OrderEvent;
use crate::event_bus::Hub;

/// Raw payload stream from an external broker.
#[async_trait]
pub trait MessageSource: Send {
    /// Short name used in logs (`redis`, `channel`, ..)
    fn name(&self) -> &str;

    /// Wait for the next payload. `Ok(None)` means the broker closed the stream.
    async fn next_payload(&mut self) -> ProducerResult<Option<Vec<u8>>>;
}

/// Consumes a [`MessageSource`], decoding each payload into an [`OrderEvent`].
///
/// Malformed payloads are logged and skipped. The loop ends with an error when
/// the source fails or `cancel` fires, and with `Ok` when the source closes.
pub struct BrokerConsumer<S> {
    source: S,
}

impl<S: MessageSource> BrokerConsumer<S> {
    /// Wrap a source.
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

async fn decode_and_publish(source: &str, hub: &Hub, payload: &[u8]) {
    match OrderEvent::decode(payload) {
        Ok(event) => {
            debug!(source, event_id = %event.id, "Event consumed");
            hub.publish(event).await;
        }
        Err(e) => {
            warn!(source, error = %e, "Skipping undecodable payload");
        }
    }
}

#[async_trait]
impl<S: MessageSource> Producer for BrokerConsumer<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn run(&mut self, hub: Arc<Hub>, cancel: CancellationToken) -> ProducerResult<()> {
        let source = self.source.name().to_string();
        info!(%source, "Broker consumer started");
        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => return Err(ProducerError::Cancelled),
                payload = self.source.next_payload() => payload?,
            };
            match payload {
                Some(payload) => decode_and_publish(&source, &hub, &payload).await,
                None => {
                    info!(%source, "Broker stream closed");
                    return Ok(());
                }
            }
        }
    }
}

/// In-process source fed through an mpsc channel.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    /// Source plus the sender that feeds it.
    #[must_use]
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    fn name(&self) -> &str {
        "channel"
    }

    async fn next_payload(&mut self) -> ProducerResult<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}
