//! `orderpulse replay`: dump the durable log after a cursor.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use orderpulse_core::{EventStore, FileLog, OrderEvent};
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{info, warn};

use crate::server::load_config;
use crate::stream::cursor::parse_cursor;

pub async fn run(config_path: Option<&Path>, since: &str) -> Result<()> {
    let config = load_config(config_path).context("Failed to load configuration")?;
    if !config.log.enabled {
        warn!("Durable log is disabled in config; reading {} anyway", config.log.path.display());
    }
    let since = parse_cursor(None, Some(since), Utc::now())
        .ok_or_else(|| anyhow!("invalid --since value: {since}"))?;

    let log = FileLog::open(config.log.to_store_config())
        .await
        .with_context(|| format!("Failed to open event log at {}", config.log.path.display()))?;

    let mut out = std::io::BufWriter::new(std::io::stdout());
    let count = write_since(&log, since, &mut out).await?;
    out.flush().context("Failed to flush output")?;
    info!(count, %since, "Replay complete");
    Ok(())
}

/// Write every logged event after `since` to `out`, one JSON object per line.
async fn write_since<W: Write + Send>(
    store: &dyn EventStore,
    since: DateTime<Utc>,
    out: &mut W,
) -> Result<usize> {
    let mut count = 0;
    let mut write_error = None;
    let mut visit = |event: OrderEvent| {
        let written = serde_json::to_writer(&mut *out, &event)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"));
        match written {
            Ok(()) => {
                count += 1;
                ControlFlow::Continue(())
            }
            Err(e) => {
                write_error = Some(e);
                ControlFlow::Break(())
            }
        }
    };
    store
        .replay_since(since, &mut visit)
        .await
        .context("Failed to read event log")?;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write output");
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use orderpulse_core::LogConfig;

    #[tokio::test]
    async fn test_writes_ndjson_after_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileLog::open(LogConfig::new(dir.path().join("events.log")))
            .await
            .unwrap();
        let base = Utc::now() - TimeDelta::minutes(10);
        for i in 0..4 {
            let mut ev = OrderEvent::new(format!("o{i}"), "order.created", "paid", 10)
                .with_timestamp(base + TimeDelta::minutes(i));
            ev.id = format!("e{i}");
            log.append(&ev).await.unwrap();
        }

        let mut out = Vec::new();
        let count = write_since(&log, base + TimeDelta::seconds(90), &mut out)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let lines: Vec<OrderEvent> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let ids: Vec<_> = lines.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["e2", "e3"]);
    }
}
