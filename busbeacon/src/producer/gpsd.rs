//! gpsd client provider.
//!
//! Connects to a gpsd daemon, enables JSON watch mode and turns TPV reports
//! into position readings.
//!
//! # Error mapping
//!
//! | Condition                                   | Code |
//! |---------------------------------------------|------|
//! | TPV without a 2D/3D fix                     | 2    |
//! | no fix for longer than the acquisition timeout | 3 |
//! | connection refused / host unreachable       | 2    |
//! | permission denied on the socket             | 1    |
//! | anything else                               | 0    |
//!
//! Repeated errors with the same code are reported once until the next fix.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::geolocation::{GeolocationError, GeolocationErrorCode};
use super::source::{emit, PositionProvider, PositionReading, PositionWatch};
use crate::record::Location;
use crate::time::Clock;

/// Default gpsd host.
pub const DEFAULT_GPSD_HOST: &str = "127.0.0.1";

/// Default gpsd port.
pub const DEFAULT_GPSD_PORT: u16 = 2947;

/// Default time without a fix before a timeout is reported.
pub const DEFAULT_ACQUISITION_TIMEOUT_SECS: u64 = 30;

/// Fix times further than this from the local clock are logged.
const MAX_FIX_SKEW_MS: i64 = 60_000;

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true}\n";

/// gpsd connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsdConfig {
    pub host: String,
    pub port: u16,
    pub acquisition_timeout: Duration,
}

impl Default for GpsdConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GPSD_HOST.to_string(),
            port: DEFAULT_GPSD_PORT,
            acquisition_timeout: Duration::from_secs(DEFAULT_ACQUISITION_TIMEOUT_SECS),
        }
    }
}

/// Position provider backed by gpsd.
pub struct GpsdProvider {
    config: GpsdConfig,
    clock: Arc<dyn Clock>,
}

impl GpsdProvider {
    pub fn new(config: GpsdConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &GpsdConfig {
        &self.config
    }
}

impl PositionProvider for GpsdProvider {
    fn watch(&self) -> Result<PositionWatch, GeolocationError> {
        let (tx, cancel, watch) = PositionWatch::channel();
        tokio::spawn(run(self.config.clone(), Arc::clone(&self.clock), tx, cancel));
        Ok(watch)
    }

    fn name(&self) -> &'static str {
        "gpsd"
    }
}

async fn run(
    config: GpsdConfig,
    clock: Arc<dyn Clock>,
    tx: mpsc::Sender<PositionReading>,
    cancel: CancellationToken,
) {
    let address = format!("{}:{}", config.host, config.port);

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = TcpStream::connect(&address) => result,
    };
    let stream = match connected {
        Ok(stream) => stream,
        Err(e) => {
            warn!(address = %address, error = %e, "Failed to connect to gpsd");
            emit(&tx, &cancel, Err(classify_io_error(&address, &e))).await;
            return;
        }
    };

    let (reader, mut writer) = stream.into_split();
    if let Err(e) = writer.write_all(WATCH_COMMAND).await {
        emit(&tx, &cancel, Err(classify_io_error(&address, &e))).await;
        return;
    }
    info!(address = %address, "gpsd watch enabled");

    let mut lines = BufReader::new(reader).lines();
    let mut deadline = Instant::now() + config.acquisition_timeout;
    let mut last_error: Option<GeolocationErrorCode> = None;
    let mut fixes: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout_at(deadline, lines.next_line()) => next,
        };

        let reading = match next {
            Err(_elapsed) => {
                deadline = Instant::now() + config.acquisition_timeout;
                Err(GeolocationError::timeout(format!(
                    "no position fix within {}s",
                    config.acquisition_timeout.as_secs()
                )))
            }
            Ok(Ok(Some(line))) => match parse_report(&line, clock.now_millis()) {
                Some(reading) => reading,
                None => continue,
            },
            Ok(Ok(None)) => {
                emit(
                    &tx,
                    &cancel,
                    Err(GeolocationError::position_unavailable(
                        "gpsd closed the connection",
                    )),
                )
                .await;
                break;
            }
            Ok(Err(e)) => {
                emit(&tx, &cancel, Err(classify_io_error(&address, &e))).await;
                break;
            }
        };

        match &reading {
            Ok(_) => {
                fixes += 1;
                last_error = None;
                deadline = Instant::now() + config.acquisition_timeout;
                if fixes == 1 {
                    info!("First gpsd fix received");
                }
            }
            Err(error) => {
                if last_error == Some(error.code) {
                    trace!(code = error.code.code(), "Repeated gpsd error suppressed");
                    continue;
                }
                last_error = Some(error.code);
            }
        }

        if !emit(&tx, &cancel, reading).await {
            break;
        }
    }

    debug!(address = %address, fixes, "gpsd watch stopped");
}

#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    time: Option<String>,
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
    speed: Option<f64>,
    track: Option<f64>,
}

/// Interpret one gpsd JSON line.
///
/// Returns `None` for reports other than TPV and for unparseable lines.
/// Fixes are stamped with `now_millis`, the local clock at sample time; the
/// receiver's own fix time is only logged.
fn parse_report(line: &str, now_millis: i64) -> Option<PositionReading> {
    let report: Report = match serde_json::from_str(line) {
        Ok(report) => report,
        Err(e) => {
            trace!(error = %e, "Ignoring unparseable gpsd line");
            return None;
        }
    };
    if report.class != "TPV" {
        return None;
    }

    let (Some(latitude), Some(longitude)) = (report.lat, report.lon) else {
        return Some(Err(GeolocationError::position_unavailable("no GPS fix")));
    };
    if report.mode < 2 {
        return Some(Err(GeolocationError::position_unavailable("no GPS fix")));
    }

    let fix_time = report
        .time
        .as_deref()
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.timestamp_millis());
    if let Some(fix_millis) = fix_time {
        let skew_ms = now_millis - fix_millis;
        if skew_ms.abs() > MAX_FIX_SKEW_MS {
            debug!(fix_millis, now_millis, skew_ms, "GPS fix time far from local clock");
        }
    }

    let accuracy = report.eph.or(match (report.epx, report.epy) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    });

    let mut location = Location::new(latitude, longitude, now_millis)
        .with_motion(report.speed, report.track);
    if let Some(accuracy) = accuracy {
        location = location.with_accuracy(accuracy);
    }
    Some(Ok(location))
}

fn classify_io_error(address: &str, error: &io::Error) -> GeolocationError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => {
            GeolocationError::permission_denied(format!("access to gpsd at {} denied: {}", address, error))
        }
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotFound
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => GeolocationError::position_unavailable(format!(
            "gpsd not reachable at {}: {}",
            address, error
        )),
        io::ErrorKind::TimedOut => {
            GeolocationError::timeout(format!("gpsd at {} timed out: {}", address, error))
        }
        _ => GeolocationError::unknown(format!("gpsd at {}: {}", address, error)),
    }
}
