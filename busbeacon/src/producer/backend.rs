//! Configuration-selected position provider.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::channel::ChannelProvider;
use super::geolocation::GeolocationError;
use super::gpsd::{GpsdConfig, GpsdProvider};
use super::replay::{ReplayConfig, ReplayError, ReplayProvider};
use super::source::{PositionProvider, PositionWatch};
use crate::time::Clock;

/// Which position source the producer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    #[default]
    Gpsd,
    Replay,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Gpsd => write!(f, "gpsd"),
            SourceKind::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gpsd" => Ok(SourceKind::Gpsd),
            "replay" => Ok(SourceKind::Replay),
            other => Err(format!("unknown position source '{}'", other)),
        }
    }
}

/// Producer-side configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProducerConfig {
    pub source: SourceKind,
    pub gpsd: GpsdConfig,
    /// Required when `source` is `Replay`.
    pub replay: Option<ReplayConfig>,
}

/// Position provider chosen at runtime.
pub enum PositionBackend {
    Gpsd(GpsdProvider),
    Replay(ReplayProvider),
    Channel(ChannelProvider),
}

impl PositionBackend {
    /// Build the configured provider.
    pub fn from_config(config: &ProducerConfig, clock: Arc<dyn Clock>) -> Result<Self, ReplayError> {
        match config.source {
            SourceKind::Gpsd => Ok(PositionBackend::Gpsd(GpsdProvider::new(
                config.gpsd.clone(),
                clock,
            ))),
            SourceKind::Replay => {
                let replay = config.replay.as_ref().ok_or(ReplayError::Empty)?;
                Ok(PositionBackend::Replay(ReplayProvider::load(replay, clock)?))
            }
        }
    }
}

impl PositionProvider for PositionBackend {
    fn watch(&self) -> Result<PositionWatch, GeolocationError> {
        match self {
            PositionBackend::Gpsd(provider) => provider.watch(),
            PositionBackend::Replay(provider) => provider.watch(),
            PositionBackend::Channel(provider) => provider.watch(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PositionBackend::Gpsd(provider) => provider.name(),
            PositionBackend::Replay(provider) => provider.name(),
            PositionBackend::Channel(provider) => provider.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("GPSD".parse::<SourceKind>(), Ok(SourceKind::Gpsd));
        assert_eq!("replay".parse::<SourceKind>(), Ok(SourceKind::Replay));
        assert!("browser".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_default_is_gpsd() {
        let backend =
            PositionBackend::from_config(&ProducerConfig::default(), Arc::new(ManualClock::new(0)))
                .unwrap();
        assert_eq!(backend.name(), "gpsd");
    }

    #[test]
    fn test_replay_without_file_fails() {
        let config = ProducerConfig {
            source: SourceKind::Replay,
            ..ProducerConfig::default()
        };
        assert!(PositionBackend::from_config(&config, Arc::new(ManualClock::new(0))).is_err());
    }
}
