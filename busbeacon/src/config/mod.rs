//! Configuration for busbeacon.
//!
//! User settings live in `~/.busbeacon/config.ini`. The file is split into
//! sections that map onto component configs:
//!
//! - `[store]` -> [`StoreConfig`](crate::store::StoreConfig)
//! - `[consumer]` -> [`FeedMode`](crate::store::FeedMode)
//! - `[producer]` -> [`ProducerConfig`](crate::producer::ProducerConfig)
//! - `[logging]` -> log file location
//!
//! # Example
//!
//! ```
//! use busbeacon::config::ConfigFile;
//! use busbeacon::store::BackendKind;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.store.backend, BackendKind::Rest);
//! assert_eq!(config.store.path, "busData/live");
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, ConsumerSettings, LoggingSettings, ProducerSettings, StoreSettings};
