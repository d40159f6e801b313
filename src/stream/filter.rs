//! Per-connection allow-lists on event type and status.

use orderpulse_core::OrderEvent;
use std::collections::HashSet;

/// Empty set on a dimension means "no filtering" on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    types: HashSet<String>,
    statuses: HashSet<String>,
}

impl EventFilter {
    /// Build from comma-separated query values (`types=order.created,order.shipped`).
    pub fn from_query(types: Option<&str>, statuses: Option<&str>) -> Self {
        Self {
            types: split_list(types),
            statuses: split_list(statuses),
        }
    }

    pub fn matches(&self, event: &OrderEvent) -> bool {
        (self.types.is_empty() || self.types.contains(&event.event_type))
            && (self.statuses.is_empty() || self.statuses.contains(&event.status))
    }
}

fn split_list(raw: Option<&str>) -> HashSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
