//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, the async runtime and
//! store/provider creation to reduce duplication across command handlers.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use busbeacon::config::{config_file_path, ConfigFile};
use busbeacon::logging::{init_logging, LoggingGuard, LoggingOptions};
use busbeacon::producer::{PositionBackend, ProducerConfig, ReplayConfig, SourceKind};
use busbeacon::store::StoreBackend;
use busbeacon::time::system_clock;
use tokio::runtime::Runtime;
use tracing::info;

use crate::commands::common::GlobalOptions;
use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
    config_path: PathBuf,
    runtime: Runtime,
}

impl CliRunner {
    /// Load config, initialize logging and start the runtime.
    ///
    /// Log lines go to the configured file; with `--debug` they are also
    /// mirrored to stderr.
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let config_path = options
            .config
            .clone()
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard = init_logging(&LoggingOptions {
            file: config.logging.file.clone(),
            debug: options.debug,
            console: options.debug,
        })
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
            runtime,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("busbeacon v{}", busbeacon::VERSION);
        info!(
            command,
            config = %self.config_path.display(),
            log = %self.logging_guard.path().display(),
            "busbeacon CLI started"
        );
    }

    /// Run a future to completion on the runner's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Create the configured store backend.
    pub fn create_store(&self) -> Result<Arc<StoreBackend>, CliError> {
        let store_config = self.config.store.to_store_config();
        let store = StoreBackend::from_config(&store_config)?;
        info!(
            backend = %store_config.backend,
            path = %store_config.path,
            timestamps = %store_config.timestamps,
            "Store ready"
        );
        Ok(Arc::new(store))
    }

    /// Create the configured position source, or replay `replay` if given.
    pub fn create_provider(&self, replay: Option<PathBuf>) -> Result<Arc<PositionBackend>, CliError> {
        let producer_config = resolve_producer_config(&self.config, replay);
        let provider = PositionBackend::from_config(&producer_config, system_clock())?;
        info!(source = %producer_config.source, "Position source ready");
        Ok(Arc::new(provider))
    }
}

/// Producer config with an optional track-file override.
fn resolve_producer_config(config: &ConfigFile, replay: Option<PathBuf>) -> ProducerConfig {
    let mut producer = config.producer.to_producer_config();
    if let Some(path) = replay {
        let interval = std::time::Duration::from_millis(config.producer.replay_interval_ms);
        producer.source = SourceKind::Replay;
        producer.replay = Some(ReplayConfig {
            path,
            interval,
            looping: config.producer.replay_loop,
        });
    }
    producer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_override_switches_source() {
        let config = ConfigFile::default();

        let producer = resolve_producer_config(&config, Some(PathBuf::from("/tmp/route.jsonl")));

        assert_eq!(producer.source, SourceKind::Replay);
        assert_eq!(
            producer.replay.map(|r| r.path),
            Some(PathBuf::from("/tmp/route.jsonl"))
        );
    }

    #[test]
    fn test_no_override_keeps_config() {
        let config = ConfigFile::default();
        let producer = resolve_producer_config(&config, None);
        assert_eq!(producer.source, SourceKind::Gpsd);
        assert!(producer.replay.is_none());
    }
}
