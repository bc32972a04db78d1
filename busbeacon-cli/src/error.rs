//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use busbeacon::config::ConfigFileError;
use busbeacon::producer::ReplayError;
use busbeacon::session::SessionError;
use busbeacon::store::{ConnectionCheck, StoreError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Store request failed
    Store(StoreError),
    /// Role could not be entered
    Session(SessionError),
    /// Track file could not be loaded
    Replay(ReplayError),
    /// Connectivity check did not reach the database
    Unreachable(ConnectionCheck),
    /// Terminal input failed
    Input(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let Some(hints) = self.hints() {
            eprintln!();
            for line in hints {
                eprintln!("{}", line);
            }
        }

        process::exit(1)
    }

    fn hints(&self) -> Option<Vec<&'static str>> {
        let store_error = match self {
            CliError::Store(e) => Some(e),
            CliError::Session(e) => Some(e.store_error()),
            _ => None,
        };

        if let Some(e) = store_error {
            if e.is_permission_denied() {
                return Some(vec![
                    "The database refused the request. Check that:",
                    "  1. auth_token in [store] is a valid secret or ID token",
                    "  2. The database rules allow reads and writes on the record path",
                ]);
            }
            if let StoreError::Unavailable(_) = e {
                return Some(vec![
                    "Set database_url in the [store] section of config.ini,",
                    "or use backend = memory for a local demo.",
                    "Run 'busbeacon config init' to create a commented config file.",
                ]);
            }
            return Some(vec![
                "Could not reach the shared record.",
                "Run 'busbeacon verify' to check the connection.",
            ]);
        }

        match self {
            CliError::Unreachable(ConnectionCheck::DatabaseMissing) => Some(vec![
                "The project exists but has no realtime database.",
                "Create one in the project console, then copy its URL into database_url.",
            ]),
            CliError::Unreachable(ConnectionCheck::Unreachable(_)) => Some(vec![
                "Check your network connection and the database_url in config.ini.",
            ]),
            CliError::Replay(_) => Some(vec![
                "Track files hold one JSON object per line, for example:",
                "  {\"latitude\": 18.4861, \"longitude\": -69.9312, \"accuracy\": 8}",
            ]),
            _ => None,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Store(e) => write!(f, "{}", e),
            CliError::Session(e) => write!(f, "{}", e),
            CliError::Replay(e) => write!(f, "{}", e),
            CliError::Unreachable(check) => write!(f, "Database check failed: {}", check),
            CliError::Input(e) => write!(f, "Failed to read input: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Replay(e) => Some(e),
            CliError::Input(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

impl From<ReplayError> for CliError {
    fn from(e: ReplayError) -> Self {
        CliError::Replay(e)
    }
}
