//! Default values and constants for all configuration settings.
//!
//! Component defaults are defined next to the components; this module
//! re-exports them for the config file and adds the file-only ones.

use super::file::config_directory;
use super::settings::*;
use crate::record::DEFAULT_RECORD_PATH;
use crate::store::{BackendKind, TimestampMode};

pub use crate::producer::{
    DEFAULT_ACQUISITION_TIMEOUT_SECS, DEFAULT_GPSD_HOST, DEFAULT_GPSD_PORT,
    DEFAULT_REPLAY_INTERVAL_MS,
};
pub use crate::store::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Default consumer mode.
pub const DEFAULT_CONSUMER_MODE: &str = "push";

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Smallest accepted poll interval in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 250;

/// Log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "busbeacon.log";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                backend: BackendKind::Rest,
                database_url: None,
                path: DEFAULT_RECORD_PATH.to_string(),
                auth_token: None,
                timestamps: TimestampMode::Server,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            consumer: ConsumerSettings {
                mode: DEFAULT_CONSUMER_MODE.to_string(),
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            },
            producer: ProducerSettings {
                source: crate::producer::SourceKind::Gpsd,
                gpsd_host: DEFAULT_GPSD_HOST.to_string(),
                gpsd_port: DEFAULT_GPSD_PORT,
                acquisition_timeout_secs: DEFAULT_ACQUISITION_TIMEOUT_SECS,
                replay_file: None,
                replay_interval_ms: DEFAULT_REPLAY_INTERVAL_MS,
                replay_loop: false,
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
