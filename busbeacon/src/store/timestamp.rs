//! Write timestamping.
//!
//! Every write stamps `lastUpdatedAt`. With server timestamping the store
//! assigns the value when the write lands, which keeps stamps monotonic
//! across writers with skewed clocks. Local timestamping uses the writer's
//! clock and is a degraded fallback.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::time::Clock;

/// Where `lastUpdatedAt` values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMode {
    /// The store assigns the time at write.
    #[default]
    Server,
    /// The writer's local clock.
    Local,
}

impl TimestampMode {
    /// Config-file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampMode::Server => "server",
            TimestampMode::Local => "local",
        }
    }
}

impl fmt::Display for TimestampMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimestampMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "server" => Ok(TimestampMode::Server),
            "local" => Ok(TimestampMode::Local),
            other => Err(format!("unknown timestamp mode '{}'", other)),
        }
    }
}

/// Placeholder the REST store replaces with its own clock at write time.
pub fn server_timestamp_placeholder() -> Value {
    json!({ ".sv": "timestamp" })
}

/// Returns true if `value` is the server-time placeholder.
pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|o| o.get(".sv"))
        .and_then(Value::as_str)
        == Some("timestamp")
}

/// Produces stamp values for a backend that defers to a remote server clock.
#[derive(Clone)]
pub struct Stamper {
    mode: TimestampMode,
    clock: Arc<dyn Clock>,
}

impl Stamper {
    /// Create a stamper. `clock` is only consulted in local mode.
    pub fn new(mode: TimestampMode, clock: Arc<dyn Clock>) -> Self {
        Self { mode, clock }
    }

    /// The configured mode.
    pub fn mode(&self) -> TimestampMode {
        self.mode
    }

    /// The value to send for `lastUpdatedAt`.
    pub fn stamp(&self) -> Value {
        match self.mode {
            TimestampMode::Server => server_timestamp_placeholder(),
            TimestampMode::Local => Value::from(self.clock.now_millis()),
        }
    }
}

impl fmt::Debug for Stamper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stamper").field("mode", &self.mode).finish()
    }
}
