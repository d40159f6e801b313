//! Producer startup
//!
//! Each producer runs on its own task with a child token of the shutdown
//! controller. Failures are logged and the task ends; nothing restarts it.

use orderpulse_core::{
    BrokerConsumer, Generator, Hub, Producer, ProducerError, RedisPubSubSource, ShutdownController,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::config::AppConfig;

/// Spawn every producer enabled in `config`.
pub fn start_producers(
    config: &AppConfig,
    hub: &Arc<Hub>,
    shutdown: &Arc<ShutdownController>,
) -> Vec<JoinHandle<()>> {
    let mut producers: Vec<Box<dyn Producer>> = Vec::new();

    if config.generator.enabled {
        producers.push(Box::new(Generator::new(Duration::from_millis(
            config.generator.tick_ms,
        ))));
    }
    if config.redis.enabled {
        producers.push(Box::new(BrokerConsumer::new(RedisPubSubSource::new(
            config.redis.url.clone(),
            config.redis.channel.clone(),
        ))));
    }
    if producers.is_empty() {
        info!("No producers enabled; serving replay and externally published events only");
    }

    producers
        .into_iter()
        .map(|producer| start_producer(producer, hub.clone(), shutdown))
        .collect()
}

/// Run one producer until it returns or shutdown cancels it.
pub fn start_producer(
    mut producer: Box<dyn Producer>,
    hub: Arc<Hub>,
    shutdown: &Arc<ShutdownController>,
) -> JoinHandle<()> {
    let guard = shutdown.register_task();
    let token = guard.token();
    let name = producer.name().to_string();
    info!(producer = %name, "Producer started");

    tokio::spawn(async move {
        let _guard = guard;
        match producer.run(hub, token).await {
            Ok(()) => info!(producer = %name, "Producer finished"),
            Err(ProducerError::Cancelled) => info!(producer = %name, "Producer cancelled"),
            Err(e) => error!(producer = %name, error = %e, "Producer failed"),
        }
    })
}
