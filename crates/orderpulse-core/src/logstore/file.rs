use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::ErrorKind;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::EventStore;
use crate::error::{LogError, LogResult};
use crate::event::OrderEvent;

const ROTATED_SUFFIX_FORMAT: &str = "%Y%m%dT%H%M%S%.9f";

/// Settings for [`FileLog`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Active file path; rotated siblings live in the same directory
    pub path: PathBuf,
    /// Rotate once the active file reaches this size
    pub max_bytes: u64,
    /// Rotated files at least this old are deleted
    pub retention: Duration,
    /// Minimum time between retention sweeps
    pub sweep_interval: Duration,
}

impl LogConfig {
    /// Config with default limits (10 MiB, 72h retention, sweep every minute).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: 10 * 1024 * 1024,
            retention: Duration::from_secs(72 * 3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct WriterState {
    last_sweep: Option<Instant>,
}

/// Rotating NDJSON event log (single writer).
///
/// One mutex covers size check, rotation, retention sweep and the write, so
/// concurrent appenders never interleave partial lines or double-rotate.
/// Readers open the file independently and never take that lock.
#[derive(Debug)]
pub struct FileLog {
    config: LogConfig,
    stem: String,
    extension: Option<String>,
    writer: Mutex<WriterState>,
}

impl FileLog {
    /// Create the log directory and the active file if needed.
    pub async fn open(config: LogConfig) -> LogResult<Self> {
        let stem = config
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LogError::Unavailable(format!("bad log path {}", config.path.display())))?
            .to_string();
        let extension = config
            .path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_string);

        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;

        info!(path = %config.path.display(), max_bytes = config.max_bytes, "Durable log opened");
        Ok(Self {
            config,
            stem,
            extension,
            writer: Mutex::new(WriterState::default()),
        })
    }

    /// Active file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn dir(&self) -> &Path {
        self.config
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn rotated_name(&self, at: DateTime<Utc>) -> String {
        let suffix = at.format(ROTATED_SUFFIX_FORMAT);
        match &self.extension {
            Some(ext) => format!("{}-{}.{}", self.stem, suffix, ext),
            None => format!("{}-{}", self.stem, suffix),
        }
    }

    /// Only names this log produced: `<stem>-<suffix>[.<ext>]` with a suffix
    /// that parses back as a rotation timestamp.
    fn is_rotated(&self, name: &str) -> bool {
        let Some(rest) = name.strip_prefix(&self.stem).and_then(|r| r.strip_prefix('-')) else {
            return false;
        };
        let suffix = match &self.extension {
            Some(ext) => rest
                .strip_suffix(ext.as_str())
                .and_then(|r| r.strip_suffix('.')),
            None => Some(rest),
        };
        suffix.is_some_and(|s| NaiveDateTime::parse_from_str(s, ROTATED_SUFFIX_FORMAT).is_ok())
    }

    /// Rotated siblings of the active file, oldest first.
    pub async fn rotated_files(&self) -> LogResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(self.dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| self.is_rotated(n)) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn rotate(&self) -> LogResult<PathBuf> {
        let rotated = self.dir().join(self.rotated_name(Utc::now()));
        fs::rename(&self.config.path, &rotated).await?;
        fs::File::create(&self.config.path).await?;
        info!(rotated = %rotated.display(), "Durable log rotated");
        Ok(rotated)
    }

    /// Delete rotated files whose mtime is at least `retention` old.
    async fn sweep(&self) -> LogResult<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for path in self.rotated_files().await? {
            let modified = fs::metadata(&path).await?.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age >= self.config.retention {
                fs::remove_file(&path).await?;
                debug!(path = %path.display(), "Expired log file removed");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl EventStore for FileLog {
    async fn append(&self, event: &OrderEvent) -> LogResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut state = self.writer.lock().await;

        match fs::metadata(&self.config.path).await {
            Ok(meta) if meta.len() >= self.config.max_bytes => {
                self.rotate().await?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let sweep_due = state
            .last_sweep
            .map_or(true, |at| at.elapsed() >= self.config.sweep_interval);
        if sweep_due {
            state.last_sweep = Some(Instant::now());
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "Log retention sweep failed");
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn replay_since(
        &self,
        since: DateTime<Utc>,
        visit: &mut (dyn FnMut(OrderEvent) -> ControlFlow<()> + Send),
    ) -> LogResult<()> {
        let file = match fs::File::open(&self.config.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await? {
            let event: OrderEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed log record");
                    continue;
                }
            };
            if event.ts > since && visit(event).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn health(&self) -> LogResult<()> {
        let meta = fs::metadata(self.dir()).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(LogError::Unavailable(format!(
                "{} is not a directory",
                self.dir().display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;
    use tempfile::TempDir;

    fn event(id: &str, ts: DateTime<Utc>) -> OrderEvent {
        let mut ev = OrderEvent::new("o-1", "order.created", "paid", 250).with_timestamp(ts);
        ev.id = id.to_string();
        ev
    }

    fn config(dir: &TempDir) -> LogConfig {
        LogConfig {
            path: dir.path().join("logs").join("events.log"),
            max_bytes: 1024 * 1024,
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }

    async fn replay_ids(log: &FileLog, since: DateTime<Utc>) -> Vec<String> {
        let mut ids = Vec::new();
        log.replay_since(since, &mut |ev| {
            ids.push(ev.id);
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
        ids
    }

    #[tokio::test]
    async fn test_open_creates_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let log = FileLog::open(config(&dir)).await.unwrap();

        assert!(log.path().exists());
        assert!(log.health().await.is_ok());
        assert!(replay_ids(&log, Utc::now() - TimeDelta::hours(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_append_and_replay_since() {
        let dir = TempDir::new().unwrap();
        let log = FileLog::open(config(&dir)).await.unwrap();
        let base = Utc::now() - TimeDelta::minutes(5);

        for i in 0..4 {
            log.append(&event(&i.to_string(), base + TimeDelta::seconds(i)))
                .await
                .unwrap();
        }

        assert_eq!(replay_ids(&log, base + TimeDelta::seconds(1)).await, vec!["2", "3"]);
        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let log = FileLog::open(config(&dir)).await.unwrap();
        let base = Utc::now() - TimeDelta::minutes(5);

        log.append(&event("a", base)).await.unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"{garbage\n\n"))
            .unwrap();
        log.append(&event("b", base + TimeDelta::seconds(1))).await.unwrap();

        assert_eq!(replay_ids(&log, base - TimeDelta::seconds(1)).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_visitor_can_stop_early() {
        let dir = TempDir::new().unwrap();
        let log = FileLog::open(config(&dir)).await.unwrap();
        let base = Utc::now() - TimeDelta::minutes(5);
        for i in 0..5 {
            log.append(&event(&i.to_string(), base + TimeDelta::seconds(i)))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        log.replay_since(base - TimeDelta::seconds(1), &mut |ev| {
            seen.push(ev.id);
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap();
        assert_eq!(seen, vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_rotation_on_size() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.max_bytes = 64;
        let log = FileLog::open(cfg).await.unwrap();
        let base = Utc::now() - TimeDelta::minutes(5);

        // one record is larger than 64 bytes, so the next append rotates
        log.append(&event("first", base)).await.unwrap();
        assert!(log.rotated_files().await.unwrap().is_empty());

        log.append(&event("second", base + TimeDelta::seconds(1)))
            .await
            .unwrap();

        let rotated = log.rotated_files().await.unwrap();
        assert_eq!(rotated.len(), 1);
        let old = std::fs::read_to_string(&rotated[0]).unwrap();
        assert!(old.contains("\"first\""));
        assert_eq!(old.lines().count(), 1);

        let active = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(active.lines().count(), 1);
        assert!(active.contains("\"second\""));

        // replay only scans the active file
        assert_eq!(replay_ids(&log, base - TimeDelta::seconds(1)).await, vec!["second"]);
    }

    #[tokio::test]
    async fn test_retention_sweep_keeps_active_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.max_bytes = 64;
        cfg.retention = Duration::ZERO;
        cfg.sweep_interval = Duration::ZERO;
        let log = FileLog::open(cfg).await.unwrap();
        let foreign = log.path().parent().unwrap().join("notes.txt");
        std::fs::write(&foreign, "keep me").unwrap();

        let now = Utc::now();
        log.append(&event("a", now)).await.unwrap();
        log.append(&event("b", now)).await.unwrap();

        assert!(log.rotated_files().await.unwrap().is_empty());
        assert!(log.path().exists());
        assert!(foreign.exists());
        assert_eq!(replay_ids(&log, now - TimeDelta::seconds(1)).await, vec!["b"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let log = std::sync::Arc::new(FileLog::open(config(&dir)).await.unwrap());

        let mut handles = Vec::new();
        for p in 0..4 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    log.append(&event(&format!("{p}-{i}"), Utc::now())).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 100);
        for line in raw.lines() {
            serde_json::from_str::<OrderEvent>(line).unwrap();
        }
    }

    #[test]
    fn test_rotated_name_matching() {
        let cfg = LogConfig::new("/tmp/x/events.log");
        let log = FileLog {
            stem: "events".to_string(),
            extension: Some("log".to_string()),
            config: cfg,
            writer: Mutex::new(WriterState::default()),
        };
        let name = log.rotated_name(Utc::now());
        assert!(log.is_rotated(&name));
        assert!(!log.is_rotated("events.log"));
        assert!(!log.is_rotated("eventsX-1.log"));
        assert!(!log.is_rotated("events-1.txt"));
        assert!(!log.is_rotated("events-archive.log"));
        assert!(log.is_rotated("events-20250101T000000.000000001.log"));
    }

    #[tokio::test]
    async fn test_sweep_keeps_lookalike_siblings() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.max_bytes = 64;
        cfg.retention = Duration::ZERO;
        cfg.sweep_interval = Duration::ZERO;
        let log = FileLog::open(cfg).await.unwrap();
        let archive = log.path().parent().unwrap().join("events-archive.log");
        std::fs::write(&archive, "keep me").unwrap();

        let now = Utc::now();
        log.append(&event("a", now)).await.unwrap();
        log.append(&event("b", now)).await.unwrap();

        assert!(log.rotated_files().await.unwrap().is_empty());
        assert!(archive.exists());
    }
}
