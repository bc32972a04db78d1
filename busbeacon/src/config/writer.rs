//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::defaults::*;
use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let database_url = config.store.database_url.as_deref().unwrap_or("");
    let auth_token = config.store.auth_token.as_deref().unwrap_or("");
    let replay_file = config
        .producer
        .replay_file
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();
    let replay_loop = if config.producer.replay_loop {
        "true"
    } else {
        "false"
    };

    format!(
        r#"[store]
; Where the shared bus record lives:
;   rest   - hosted realtime database reached over HTTPS (default)
;   memory - in-process store, only visible to this process (demos, testing)
backend = {}
; Database root URL (required for backend = rest)
; Example: database_url = https://my-project-default-rtdb.firebaseio.com
database_url = {}
; Path of the shared record inside the database (default: {})
path = {}
; Database secret or ID token sent as ?auth= (leave empty for open rules)
auth_token = {}
; Source of lastUpdatedAt values:
;   server - the database stamps each write with its own clock (default)
;   local  - this device's clock (observers may see skew)
timestamps = {}
; Timeout in seconds for each HTTP request (default: {})
request_timeout_secs = {}

[consumer]
; How `busbeacon watch` follows the record:
;   push - keep a streaming connection open (default)
;   poll - read the record on a fixed interval
mode = {}
; Poll interval in milliseconds, poll mode only (default: {}, minimum: {})
poll_interval_ms = {}

[producer]
; Position source for `busbeacon drive`:
;   gpsd   - local gpsd daemon (default)
;   replay - recorded JSON-lines track file
source = {}
gpsd_host = {}
gpsd_port = {}
; Seconds without a fix before a timeout is reported (default: {})
acquisition_timeout_secs = {}
; Track file for source = replay. One JSON object per line:
;   {{"latitude": 18.48, "longitude": -69.93, "accuracy": 8}}
;   {{"error": {{"code": 3, "message": "Timeout expired"}}}}
replay_file = {}
; Delay between replayed entries in milliseconds (default: {})
replay_interval_ms = {}
; Start over at the end of the track
replay_loop = {}

[logging]
; Log file, cleared at the start of each run
file = {}
"#,
        config.store.backend,
        database_url,
        crate::record::DEFAULT_RECORD_PATH,
        config.store.path,
        auth_token,
        config.store.timestamps,
        DEFAULT_REQUEST_TIMEOUT_SECS,
        config.store.request_timeout_secs,
        config.consumer.mode,
        DEFAULT_POLL_INTERVAL_MS,
        MIN_POLL_INTERVAL_MS,
        config.consumer.poll_interval_ms,
        config.producer.source,
        config.producer.gpsd_host,
        config.producer.gpsd_port,
        DEFAULT_ACQUISITION_TIMEOUT_SECS,
        config.producer.acquisition_timeout_secs,
        replay_file,
        DEFAULT_REPLAY_INTERVAL_MS,
        config.producer.replay_interval_ms,
        replay_loop,
        path_to_string(&config.logging.file),
    )
}

/// Render a path, abbreviating the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
