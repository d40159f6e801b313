//! Order lifecycle event model
//!
//! The same JSON shape is used on the wire (SSE `data:` / WS text frames),
//! in the durable log (one object per line) and for broker payloads:
//!
//! ```json
//! {"id":"..","orderId":"..","type":"order.created","status":"paid","amount":420,"ts":"2025-01-01T00:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProducerError;

/// Known event types emitted by the synthetic generator.
pub const EVENT_TYPES: [&str; 4] = [
    "order.created",
    "status_changed",
    "order.packed",
    "order.shipped",
];

/// Known order statuses emitted by the synthetic generator.
pub const STATUSES: [&str; 4] = ["pending", "paid", "failed", "shipped"];

/// Unix seconds of 0001-01-01T00:00:00Z, the "unset" instant some upstream
/// producers serialize instead of omitting the field.
const ZERO_INSTANT_SECS: i64 = -62_135_596_800;

/// An immutable order lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Unique event id
    pub id: String,
    /// Correlation id of the order this event belongs to
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Event type tag, e.g. `order.created`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Order status tag, e.g. `paid`
    pub status: String,
    /// Amount in minor currency units
    pub amount: i64,
    /// Event time (UTC)
    pub ts: DateTime<Utc>,
}

/// Lenient shape used when decoding external payloads: every field may be
/// missing, and a missing or zero timestamp is stamped at ingestion.
#[derive(Debug, Deserialize)]
struct IncomingEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "orderId", default)]
    order_id: String,
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    ts: Option<DateTime<Utc>>,
}

impl OrderEvent {
    /// Create a new event with a fresh id, stamped with the current time.
    pub fn new(
        order_id: impl Into<String>,
        event_type: impl Into<String>,
        status: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            event_type: event_type.into(),
            status: status.into(),
            amount,
            ts: Utc::now(),
        }
    }

    /// Replace the timestamp (mostly useful for tests and backfills).
    #[must_use]
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.ts = ts;
        self
    }

    /// Decode an external JSON payload.
    ///
    /// Producers without a clock may omit `ts` or send the zero instant; those
    /// events get the current UTC time injected here rather than at the source.
    pub fn decode(payload: &[u8]) -> Result<Self, ProducerError> {
        let incoming: IncomingEvent = serde_json::from_slice(payload)?;
        let ts = match incoming.ts {
            Some(ts) if ts.timestamp() > ZERO_INSTANT_SECS => ts,
            _ => Utc::now(),
        };
        Ok(Self {
            id: incoming.id,
            order_id: incoming.order_id,
            event_type: incoming.event_type,
            status: incoming.status,
            amount: incoming.amount,
            ts,
        })
    }

    /// Event time as Unix nanoseconds (SSE record id / resumption cursor).
    #[must_use]
    pub fn timestamp_nanos(&self) -> i64 {
        self.ts.timestamp_nanos_opt().unwrap_or_default()
    }
}
