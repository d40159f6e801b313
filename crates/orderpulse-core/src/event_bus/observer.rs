//! Hub observers
//!
//! Subscriber gauges and drop counters are not process globals: the hub is
//! handed an observer at construction time, and tests can pass `NoopObserver`
//! or inspect a private `HubMetrics`.

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Callbacks fired by the hub. Every method defaults to a no-op.
pub trait HubObserver: Send + Sync {
    /// A subscriber was registered
    fn subscriber_added(&self) {}
    /// A subscriber was removed (cancelled or its receiver dropped)
    fn subscriber_removed(&self) {}
    /// An event went through `Hub::publish`
    fn event_published(&self) {}
    /// An event was discarded for one subscriber because its queue was full
    fn event_dropped(&self) {}
    /// The durable log rejected an append
    fn store_append_failed(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl HubObserver for NoopObserver {}

/// A thread-safe counter metric
#[derive(Debug, Default, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a new counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current value
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A thread-safe gauge metric (can go up and down)
#[derive(Debug, Default, Clone)]
pub struct Gauge {
    value: Arc<AtomicI64>,
}

impl Gauge {
    /// Create a new gauge
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the gauge by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the gauge by 1
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get the current value
    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of [`HubMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Currently registered subscribers
    pub subscribers: i64,
    /// Events published since start
    pub published: u64,
    /// Per-subscriber deliveries dropped due to backpressure
    pub dropped: u64,
    /// Failed durable log appends
    pub store_errors: u64,
}

/// Observer backed by atomic counters.
#[derive(Debug, Default, Clone)]
pub struct HubMetrics {
    subscribers: Gauge,
    published: Counter,
    dropped: Counter,
    store_errors: Counter,
}

impl HubMetrics {
    /// Create zeroed metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all values at once
    #[must_use]
    pub fn snapshot(&self) -> HubStats {
        HubStats {
            subscribers: self.subscribers.get(),
            published: self.published.get(),
            dropped: self.dropped.get(),
            store_errors: self.store_errors.get(),
        }
    }

    /// Render in the Prometheus text exposition format.
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let stats = self.snapshot();
        let mut output = String::new();
        for (name, kind, help, value) in [
            (
                "stream_subscribers",
                "gauge",
                "active subscribers",
                stats.subscribers.to_string(),
            ),
            (
                "stream_published_events_total",
                "counter",
                "events published to the hub",
                stats.published.to_string(),
            ),
            (
                "stream_dropped_messages_total",
                "counter",
                "messages dropped due to backpressure",
                stats.dropped.to_string(),
            ),
            (
                "stream_store_errors_total",
                "counter",
                "failed durable log appends",
                stats.store_errors.to_string(),
            ),
        ] {
            output.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n"
            ));
        }
        output
    }
}

impl HubObserver for HubMetrics {
    fn subscriber_added(&self) {
        self.subscribers.inc();
    }

    fn subscriber_removed(&self) {
        self.subscribers.dec();
    }

    fn event_published(&self) {
        self.published.inc();
    }

    fn event_dropped(&self) {
        self.dropped.inc();
    }

    fn store_append_failed(&self) {
        self.store_errors.inc();
    }
}
