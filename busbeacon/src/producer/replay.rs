//! Track replay provider.
//!
//! Plays back a JSON-lines track file, one entry per interval. Each line is
//! either a fix or an injected error:
//!
//! ```text
//! {"latitude": 18.4861, "longitude": -69.9312, "accuracy": 8.0}
//! {"error": {"code": 3, "message": "Timeout expired"}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Fixes are stamped
//! with the clock at emission time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::geolocation::GeolocationError;
use super::source::{emit, PositionProvider, PositionReading, PositionWatch};
use crate::record::{DriverError, Location};
use crate::time::Clock;

/// Default delay between replayed entries.
pub const DEFAULT_REPLAY_INTERVAL_MS: u64 = 1000;

/// Errors loading a track file.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read track file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid track entry on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Track file contains no entries")]
    Empty,
}

/// One replayed entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEntry {
    Fix {
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        speed: Option<f64>,
        heading: Option<f64>,
    },
    Error(GeolocationError),
}

impl ReplayEntry {
    fn to_reading(&self, now_millis: i64) -> PositionReading {
        match self {
            ReplayEntry::Fix {
                latitude,
                longitude,
                accuracy,
                speed,
                heading,
            } => {
                let mut location =
                    Location::new(*latitude, *longitude, now_millis).with_motion(*speed, *heading);
                if let Some(accuracy) = accuracy {
                    location = location.with_accuracy(*accuracy);
                }
                Ok(location)
            }
            ReplayEntry::Error(error) => Err(error.clone()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TrackLine {
    Error {
        error: DriverError,
    },
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        accuracy: Option<f64>,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        heading: Option<f64>,
    },
}

/// Parse track file contents.
pub fn parse_track(text: &str) -> Result<Vec<ReplayEntry>, ReplayError> {
    let mut entries = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed: TrackLine = serde_json::from_str(line).map_err(|e| ReplayError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;

        entries.push(match parsed {
            TrackLine::Error { error } => ReplayEntry::Error(GeolocationError::from(&error)),
            TrackLine::Fix {
                latitude,
                longitude,
                accuracy,
                speed,
                heading,
            } => ReplayEntry::Fix {
                latitude,
                longitude,
                accuracy,
                speed,
                heading,
            },
        });
    }

    if entries.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(entries)
}

/// Replay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    pub path: PathBuf,
    pub interval: Duration,
    pub looping: bool,
}

/// Provider replaying a recorded track.
pub struct ReplayProvider {
    entries: Arc<Vec<ReplayEntry>>,
    interval: Duration,
    looping: bool,
    clock: Arc<dyn Clock>,
}

impl ReplayProvider {
    pub fn new(
        entries: Vec<ReplayEntry>,
        interval: Duration,
        looping: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries: Arc::new(entries),
            interval,
            looping,
            clock,
        }
    }

    /// Load a track file.
    pub fn load(config: &ReplayConfig, clock: Arc<dyn Clock>) -> Result<Self, ReplayError> {
        let text = read_track(&config.path)?;
        let entries = parse_track(&text)?;
        info!(
            path = %config.path.display(),
            entries = entries.len(),
            looping = config.looping,
            "Loaded replay track"
        );
        Ok(Self::new(entries, config.interval, config.looping, clock))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_track(path: &Path) -> Result<String, ReplayError> {
    std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl PositionProvider for ReplayProvider {
    fn watch(&self) -> Result<PositionWatch, GeolocationError> {
        let (tx, cancel, watch) = PositionWatch::channel();
        tokio::spawn(run(
            Arc::clone(&self.entries),
            self.interval,
            self.looping,
            Arc::clone(&self.clock),
            tx,
            cancel,
        ));
        Ok(watch)
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

async fn run(
    entries: Arc<Vec<ReplayEntry>>,
    interval: Duration,
    looping: bool,
    clock: Arc<dyn Clock>,
    tx: mpsc::Sender<PositionReading>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut index = 0usize;
    let mut emitted: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if index == entries.len() {
            if !looping {
                debug!(emitted, "Replay track finished");
                break;
            }
            index = 0;
        }

        let reading = entries[index].to_reading(clock.now_millis());
        index += 1;
        emitted += 1;

        if !emit(&tx, &cancel, reading).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::GeolocationErrorCode;
    use crate::time::ManualClock;
    use std::io::Write;

    const TRACK: &str = r#"
# morning route
{"latitude": 18.48, "longitude": -69.93, "accuracy": 12.0}
{"error": {"code": 3, "message": "Timeout expired"}}

{"latitude": 18.49, "longitude": -69.94, "speed": 8.0, "heading": 45.0}
"#;

    #[test]
    fn test_parse_track() {
        let entries = parse_track(TRACK).unwrap();

        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0], ReplayEntry::Fix { accuracy: Some(a), .. } if a == 12.0));
        assert!(matches!(
            &entries[1],
            ReplayEntry::Error(e) if e.code == GeolocationErrorCode::Timeout
        ));
    }

    #[test]
    fn test_parse_track_reports_line() {
        let result = parse_track("{\"latitude\": 1.0, \"longitude\": 2.0}\nnot json\n");
        assert!(matches!(result, Err(ReplayError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_parse_empty_track() {
        assert!(matches!(parse_track("# nothing\n\n"), Err(ReplayError::Empty)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRACK.as_bytes()).unwrap();

        let config = ReplayConfig {
            path: file.path().to_path_buf(),
            interval: Duration::from_millis(10),
            looping: false,
        };
        let provider = ReplayProvider::load(&config, Arc::new(ManualClock::new(0))).unwrap();
        assert_eq!(provider.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let config = ReplayConfig {
            path: PathBuf::from("/nonexistent/track.jsonl"),
            interval: Duration::from_millis(10),
            looping: false,
        };
        assert!(matches!(
            ReplayProvider::load(&config, Arc::new(ManualClock::new(0))),
            Err(ReplayError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_replay_plays_entries_in_order() {
        let provider = ReplayProvider::new(
            parse_track(TRACK).unwrap(),
            Duration::from_millis(5),
            false,
            Arc::new(ManualClock::new(42)),
        );
        let mut watch = provider.watch().unwrap();

        let first = watch.next().await.unwrap().unwrap();
        assert_eq!(first.timestamp, 42);
        assert!(watch.next().await.unwrap().is_err());
        assert_eq!(watch.next().await.unwrap().unwrap().heading, Some(45.0));
        assert!(watch.next().await.is_none());
    }

    #[tokio::test]
    async fn test_replay_loops() {
        let provider = ReplayProvider::new(
            parse_track("{\"latitude\": 1.0, \"longitude\": 1.0}").unwrap(),
            Duration::from_millis(5),
            true,
            Arc::new(ManualClock::new(0)),
        );
        let mut watch = provider.watch().unwrap();

        for _ in 0..3 {
            assert!(watch.next().await.unwrap().is_ok());
        }
    }
}
