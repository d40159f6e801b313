//! OrderPulse Core - Event Distribution Hub
//!
//! This crate provides the in-process pieces of the OrderPulse stream service:
//! - Event: the order-lifecycle record exchanged everywhere
//! - EventBus: the fan-out hub with drop-on-full backpressure and replay history
//! - LogStore: append-only rotating NDJSON file for longer-window replay
//! - Producers: synthetic generator and broker consumers feeding the hub
//! - Auth: bearer token validation (HS256)
//! - Shutdown: cooperative cancellation for every long-lived task

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod logstore;
pub mod producer;
pub mod shutdown;

pub use auth::{basic_credentials_match, JwtValidator, TokenValidator, ANONYMOUS_SUBJECT};
pub use error::{AuthError, LogError, ProducerError};
pub use event::OrderEvent;
pub use event_bus::{
    Counter, Gauge, Hub, HubBuilder, HubMetrics, HubObserver, HubStats, NoopObserver, Subscriber,
};
pub use logstore::{EventStore, FileLog, LogConfig};
pub use producer::{
    BrokerConsumer, ChannelSource, Generator, MessageSource, Producer, RedisPubSubSource,
};
pub use shutdown::{
    shutdown_signal_with_controller, wait_for_shutdown_signal, ShutdownController, ShutdownPhase,
    TaskGuard,
};
