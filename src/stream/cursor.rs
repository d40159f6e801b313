//! Resumption cursors for stream endpoints.
//!
//! Sources, first match wins:
//! 1. `Last-Event-ID` header holding Unix nanoseconds (what SSE clients echo back)
//! 2. `?since=` as a relative duration (`90s`, `5m`, `1h30m`, `250ms`)
//! 3. `?since=` as an RFC3339 timestamp
//!
//! Unparseable values are ignored and the connection goes live only.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tracing::debug;

/// Resolve the replay cursor, if any.
pub fn parse_cursor(
    last_event_id: Option<&str>,
    since: Option<&str>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(id) = last_event_id.map(str::trim).filter(|s| !s.is_empty()) {
        match id.parse::<i64>() {
            Ok(nanos) => return Some(Utc.timestamp_nanos(nanos)),
            Err(_) => debug!(last_event_id = %id, "Ignoring non-numeric Last-Event-ID"),
        }
    }

    let since = since.map(str::trim).filter(|s| !s.is_empty())?;
    if let Some(window) = parse_duration(since) {
        return now.checked_sub_signed(window);
    }
    match DateTime::parse_from_rfc3339(since) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(_) => {
            debug!(since = %since, "Ignoring unparseable since");
            None
        }
    }
}

/// Parse a compound duration such as `1h30m` or `1.5s`.
pub fn parse_duration(input: &str) -> Option<TimeDelta> {
    if input == "0" {
        return Some(TimeDelta::zero());
    }

    let mut rest = input;
    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::nanoseconds(total_nanos as i64))
}
