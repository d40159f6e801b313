//! EventBus - fan-out hub for order events.
//!
//! Producers call `Hub::publish`; SSE and WebSocket connections hold a
//! `Subscriber` each and may ask for a replay of recent events on connect.

mod history;
/// Hub and subscriber handles.
pub mod hub;
/// Observer hooks and counter primitives.
pub mod observer;

pub use hub::{Hub, HubBuilder, Subscriber};
pub use observer::{Counter, Gauge, HubMetrics, HubObserver, HubStats, NoopObserver};

#[cfg(test)]
mod tests;
