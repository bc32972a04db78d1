//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use busbeacon::config::{ConsumerSettings, MIN_POLL_INTERVAL_MS};
use busbeacon::session::Role;
use busbeacon::store::FeedMode;
use clap::ValueEnum;

/// Options accepted by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Config file override
    pub config: Option<PathBuf>,
    /// Force debug-level logging
    pub debug: bool,
}

/// Producer role selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProducerRole {
    /// Bus driver sharing from their own device
    Driver,
    /// Collaborator on board sharing for the driver
    Collaborator,
}

impl From<ProducerRole> for Role {
    fn from(role: ProducerRole) -> Self {
        match role {
            ProducerRole::Driver => Role::Driver,
            ProducerRole::Collaborator => Role::Collaborator,
        }
    }
}

/// Feed mode selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum WatchMode {
    /// Streaming subscription (updates as soon as they are written)
    Push,
    /// Fixed-interval reads
    Poll,
}

/// Resolve the feed mode from CLI args and config.
///
/// CLI takes precedence; `interval_ms` alone implies poll mode. Intervals
/// below the configured minimum are raised to it.
pub fn resolve_feed_mode(
    cli_mode: Option<WatchMode>,
    cli_interval_ms: Option<u64>,
    config: &ConsumerSettings,
) -> FeedMode {
    let interval_ms = cli_interval_ms
        .unwrap_or(config.poll_interval_ms)
        .max(MIN_POLL_INTERVAL_MS);
    let interval = Duration::from_millis(interval_ms);
    match (cli_mode, cli_interval_ms) {
        (Some(WatchMode::Push), _) => FeedMode::Push,
        (Some(WatchMode::Poll), _) | (None, Some(_)) => FeedMode::poll(interval),
        (None, None) => config.feed_mode(),
    }
}
