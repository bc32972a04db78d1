//! Logging infrastructure for busbeacon.
//!
//! Provides structured logging with file output and optional console output:
//! - Writes to the configured log file (cleared on session start)
//! - Optionally mirrors to stderr so interactive stdout stays readable
//! - Configurable via RUST_LOG environment variable; `debug` overrides it

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Logging options for one process run.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Log file, truncated at startup.
    pub file: PathBuf,
    /// Force `debug` level regardless of RUST_LOG.
    pub debug: bool,
    /// Mirror log lines to stderr.
    pub console: bool,
}

/// Initialize logging system.
///
/// Creates the log directory if needed, clears the previous log file and
/// installs the global subscriber.
///
/// # Errors
///
/// Returns error if the directory cannot be created or the file cannot be cleared
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard, io::Error> {
    let (log_dir, log_file) = prepare_log_file(&options.file)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let console_layer = options.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
            .compact()
    });

    tracing_subscriber::registry()
        .with(build_filter(options.debug))
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path: options.file.clone(),
    })
}

/// Level filter: `debug` when forced, else RUST_LOG, else `info`.
pub fn build_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Create the parent directory and truncate the log file.
///
/// Returns the directory and file name for the appender.
fn prepare_log_file(path: &Path) -> Result<(PathBuf, String), io::Error> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("log path has no file name: {}", path.display()),
            )
        })?
        .to_string();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&dir)?;
    fs::write(path, "")?;

    Ok((dir, file_name))
}
