use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::Producer;
use crate::error::ProducerResult;
use crate::event::{OrderEvent, EVENT_TYPES, STATUSES};
use crate::event_bus::Hub;

/// Synthetic order traffic for demos and load checks.
#[derive(Debug)]
pub struct Generator {
    tick: Duration,
    rng: StdRng,
}

impl Generator {
    /// Generator publishing one event per `tick`.
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator (tests).
    #[must_use]
    pub fn with_seed(tick: Duration, seed: u64) -> Self {
        Self {
            tick,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn next_event(&mut self) -> OrderEvent {
        let event_type = EVENT_TYPES[self.rng.gen_range(0..EVENT_TYPES.len())];
        let status = STATUSES[self.rng.gen_range(0..STATUSES.len())];
        let amount = self.rng.gen_range(10..1000);
        let order_id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        OrderEvent::new(order_id, event_type, status, amount)
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl Producer for Generator {
    fn name(&self) -> &str {
        "generator"
    }

    async fn run(&mut self, hub: Arc<Hub>, cancel: CancellationToken) -> ProducerResult<()> {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_ms = self.tick.as_millis() as u64, "Generator started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Generator stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let event = self.next_event();
                    hub.publish(event).await;
                }
            }
        }
    }
}
