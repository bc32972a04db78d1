//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file and knows how
//! to turn itself into the matching component config.

use std::path::PathBuf;
use std::time::Duration;

use crate::producer::{GpsdConfig, ProducerConfig, ReplayConfig, SourceKind};
use crate::session::SessionConfig;
use crate::store::{BackendKind, FeedMode, StoreConfig, TimestampMode};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Shared record store
    pub store: StoreSettings,
    /// How observers follow the record
    pub consumer: ConsumerSettings,
    /// Where positions come from when driving
    pub producer: ProducerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Backend: "rest" or "memory"
    pub backend: BackendKind,
    /// Database root URL, e.g. `https://my-project.firebaseio.com`
    pub database_url: Option<String>,
    /// Logical path of the shared record
    pub path: String,
    /// Database secret or ID token appended as `auth=`
    pub auth_token: Option<String>,
    /// Timestamp source: "server" or "local"
    pub timestamps: TimestampMode,
    /// Timeout in seconds for HTTP requests.
    pub request_timeout_secs: u64,
}

/// Consumer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// "push" or "poll"
    pub mode: String,
    /// Poll interval in milliseconds (poll mode only).
    pub poll_interval_ms: u64,
}

/// Producer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSettings {
    /// Position source: "gpsd" or "replay"
    pub source: SourceKind,
    pub gpsd_host: String,
    pub gpsd_port: u16,
    /// Seconds without a fix before a timeout is reported.
    pub acquisition_timeout_secs: u64,
    /// Track file for the replay source
    pub replay_file: Option<PathBuf>,
    pub replay_interval_ms: u64,
    /// Restart the track at the end instead of stopping
    pub replay_loop: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl StoreSettings {
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            backend: self.backend,
            database_url: self.database_url.clone(),
            path: self.path.clone(),
            auth_token: self.auth_token.clone(),
            timestamps: self.timestamps,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl ConsumerSettings {
    pub fn feed_mode(&self) -> FeedMode {
        if self.mode == "poll" {
            FeedMode::poll(Duration::from_millis(self.poll_interval_ms))
        } else {
            FeedMode::Push
        }
    }
}

impl ProducerSettings {
    pub fn to_producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            source: self.source,
            gpsd: GpsdConfig {
                host: self.gpsd_host.clone(),
                port: self.gpsd_port,
                acquisition_timeout: Duration::from_secs(self.acquisition_timeout_secs),
            },
            replay: self.replay_file.as_ref().map(|path| ReplayConfig {
                path: path.clone(),
                interval: Duration::from_millis(self.replay_interval_ms),
                looping: self.replay_loop,
            }),
        }
    }
}

impl ConfigFile {
    /// Session settings: record path from `[store]`, feed mode from `[consumer]`.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            path: self.store.path.clone(),
            feed_mode: self.consumer.feed_mode(),
        }
    }
}
