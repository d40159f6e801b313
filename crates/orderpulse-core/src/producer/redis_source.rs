use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::info;

use super::broker::MessageSource;
use crate::error::ProducerResult;

type MessageStream = Pin<Box<dyn Stream<Item = redis::Msg> + Send>>;

/// Redis pub/sub channel as a broker source.
///
/// Connects lazily on the first read. A dropped connection ends the stream
/// (`Ok(None)`); reconnecting is left to the orchestrator.
pub struct RedisPubSubSource {
    url: String,
    channel: String,
    messages: Option<MessageStream>,
}

impl RedisPubSubSource {
    /// Source for `channel` on the server at `url` (`redis://host:6379`).
    pub fn new(url: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel: channel.into(),
            messages: None,
        }
    }
}

async fn connect(url: &str, channel: &str) -> ProducerResult<MessageStream> {
    let client = redis::Client::open(url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    info!(channel, "Subscribed to Redis channel");
    Ok(Box::pin(pubsub.into_on_message()))
}

#[async_trait]
impl MessageSource for RedisPubSubSource {
    fn name(&self) -> &str {
        "redis"
    }

    async fn next_payload(&mut self) -> ProducerResult<Option<Vec<u8>>> {
        if self.messages.is_none() {
            self.messages = Some(connect(&self.url, &self.channel).await?);
        }
        let Some(messages) = self.messages.as_mut() else {
            return Ok(None);
        };
        Ok(messages
            .next()
            .await
            .map(|msg| msg.get_payload_bytes().to_vec()))
    }
}
