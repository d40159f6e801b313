//! CLI module for OrderPulse
//!
//! Commands:
//! - `serve`: run the stream server (default)
//! - `replay`: print durable-log records after a cursor as NDJSON

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod replay;

/// OrderPulse order event stream
#[derive(Parser, Debug)]
#[command(name = "orderpulse")]
#[command(about = "Real-time order event stream over SSE and WebSocket")]
#[command(version)]
pub struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Print logged events newer than a cursor
    Replay {
        /// Relative window (`15m`, `1h30m`) or RFC3339 timestamp
        #[arg(long)]
        since: String,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Replay { since }) => replay::run(cli.config.as_deref(), &since).await,
        Some(Commands::Serve) | None => crate::server::run(cli.config.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::parse_from(["orderpulse"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_replay_args() {
        let cli = Cli::parse_from([
            "orderpulse",
            "replay",
            "--since",
            "15m",
            "--config",
            "custom.toml",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Some(Commands::Replay { since }) => assert_eq!(since, "15m"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_replay_requires_since() {
        assert!(Cli::try_parse_from(["orderpulse", "replay"]).is_err());
    }
}
