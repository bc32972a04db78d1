//! Configuration for the store adapter.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::timestamp::TimestampMode;
use crate::record::DEFAULT_RECORD_PATH;

/// Default HTTP request timeout for the REST backend.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Which backend holds the shared record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Hosted document database over HTTPS.
    #[default]
    Rest,
    /// In-process store (single host, tests, demos).
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Rest => write!(f, "rest"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rest" => Ok(BackendKind::Rest),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Store adapter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Backend selection.
    pub backend: BackendKind,

    /// Database root URL (REST backend only).
    pub database_url: Option<String>,

    /// Logical path of the shared record.
    pub path: String,

    /// Credential appended to REST requests.
    pub auth_token: Option<String>,

    /// Where `lastUpdatedAt` values come from.
    pub timestamps: TimestampMode,

    /// Per-request timeout for REST calls.
    pub request_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database_url: None,
            path: DEFAULT_RECORD_PATH.to_string(),
            auth_token: None,
            timestamps: TimestampMode::Server,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl StoreConfig {
    /// In-memory store configuration, mostly for tests.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, BackendKind::Rest);
        assert_eq!(config.path, "busData/live");
        assert_eq!(config.timestamps, TimestampMode::Server);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("REST".parse::<BackendKind>(), Ok(BackendKind::Rest));
        assert_eq!("memory".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert!("redis".parse::<BackendKind>().is_err());
    }
}
