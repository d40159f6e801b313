use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::collections::VecDeque;
use std::time::Duration;

use crate::event::OrderEvent;

/// Bounded recent-event buffer (hot replay tier).
///
/// Kept in arrival order and never larger than `max_events`. Arrival order is
/// not timestamp order: a broker can hand over a late event, so the age bound
/// is enforced over the whole buffer, not just the head.
#[derive(Debug)]
pub(crate) struct History {
    events: VecDeque<OrderEvent>,
    max_events: usize,
    ttl: TimeDelta,
}

impl History {
    pub(crate) fn new(max_events: usize, ttl: Duration) -> Self {
        let max_events = max_events.max(1);
        Self {
            events: VecDeque::with_capacity(max_events.min(4096)),
            max_events,
            ttl: TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::days(365 * 100)),
        }
    }

    pub(crate) fn push(&mut self, event: OrderEvent, now: DateTime<Utc>) {
        self.events.push_back(event);
        self.evict(now);
    }

    /// Enforce the count bound from the head, then drop every event older
    /// than the TTL wherever it sits.
    pub(crate) fn evict(&mut self, now: DateTime<Utc>) {
        while self.events.len() > self.max_events {
            self.events.pop_front();
        }
        let cutoff = now - self.ttl;
        while self.events.front().is_some_and(|ev| ev.ts < cutoff) {
            self.events.pop_front();
        }
        if self.events.iter().any(|ev| ev.ts < cutoff) {
            self.events.retain(|ev| ev.ts >= cutoff);
        }
    }

    /// Smallest retained timestamp.
    pub(crate) fn oldest(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|ev| ev.ts).min()
    }

    /// True when nothing newer than `since` can have been evicted, i.e. the
    /// oldest retained event is at or before the cursor.
    pub(crate) fn covers(&self, since: DateTime<Utc>) -> bool {
        self.oldest().is_some_and(|oldest| oldest <= since)
    }

    pub(crate) fn since(&self, since: DateTime<Utc>) -> Vec<OrderEvent> {
        self.events
            .iter()
            .filter(|ev| ev.ts > since)
            .cloned()
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<OrderEvent> {
        self.events.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}
