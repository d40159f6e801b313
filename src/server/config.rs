//! Server configuration types
//!
//! Every section has serde defaults so a partial file (or none at all) still
//! produces a runnable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub log: LogFileConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP listener and origin policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origins allowed for CORS and WebSocket upgrades. `"*"` allows any.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Per-connection transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_sse_buffer")]
    pub sse_buffer: usize,
    #[serde(default = "default_ws_buffer")]
    pub ws_buffer: usize,
    #[serde(default = "default_interval_secs")]
    pub keepalive_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub ws_ping_secs: u64,
    #[serde(default = "default_ws_write_timeout_secs")]
    pub ws_write_timeout_secs: u64,
    #[serde(default = "default_ws_max_read_bytes")]
    pub ws_max_read_bytes: usize,
}

impl StreamConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn ws_ping(&self) -> Duration {
        Duration::from_secs(self.ws_ping_secs)
    }

    pub fn ws_write_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_write_timeout_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sse_buffer: default_sse_buffer(),
            ws_buffer: default_ws_buffer(),
            keepalive_secs: default_interval_secs(),
            ws_ping_secs: default_interval_secs(),
            ws_write_timeout_secs: default_ws_write_timeout_secs(),
            ws_max_read_bytes: default_ws_max_read_bytes(),
        }
    }
}

fn default_sse_buffer() -> usize {
    512
}

fn default_ws_buffer() -> usize {
    256
}

fn default_interval_secs() -> u64 {
    15
}

fn default_ws_write_timeout_secs() -> u64 {
    5
}

fn default_ws_max_read_bytes() -> usize {
    512
}

/// In-memory replay window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_events: default_max_events(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_events() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    300
}

/// Durable NDJSON log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl LogFileConfig {
    /// Convert into the store's own config type.
    pub fn to_store_config(&self) -> orderpulse_core::LogConfig {
        orderpulse_core::LogConfig {
            path: self.path.clone(),
            max_bytes: self.max_bytes,
            retention: Duration::from_secs(self.retention_hours * 3600),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_log_path(),
            max_bytes: default_max_bytes(),
            retention_hours: default_retention_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("data/events.log")
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_retention_hours() -> u64 {
    72
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Synthetic traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_tick_ms() -> u64 {
    50
}

/// Redis pub/sub ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_channel")]
    pub channel: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            channel: default_redis_channel(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_channel() -> String {
    "orders".to_string()
}

/// Bearer token validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// `kid -> HS256 secret`
    #[serde(default)]
    pub keys: HashMap<String, String>,
    #[serde(default = "default_skew_secs")]
    pub skew_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
            skew_secs: default_skew_secs(),
        }
    }
}

fn default_skew_secs() -> u64 {
    30
}

/// Basic auth for `/metrics`. An empty username leaves the endpoint open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_true() -> bool {
    true
}
