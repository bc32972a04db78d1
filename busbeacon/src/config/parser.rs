//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::MIN_POLL_INTERVAL_MS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::producer::SourceKind;
use crate::store::{BackendKind, TimestampMode};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("backend") {
            config.store.backend = parse_choice::<BackendKind>(
                "store",
                "backend",
                v,
                "must be 'rest' or 'memory'",
            )?;
        }
        if let Some(v) = section.get("database_url") {
            let v = v.trim();
            if !v.is_empty() {
                if !(v.starts_with("https://") || v.starts_with("http://")) {
                    return Err(invalid(
                        "store",
                        "database_url",
                        v,
                        "must be an http:// or https:// URL",
                    ));
                }
                config.store.database_url = Some(v.trim_end_matches('/').to_string());
            }
        }
        if let Some(v) = section.get("path") {
            let path = v.trim().trim_matches('/');
            if path.is_empty() {
                return Err(invalid("store", "path", v, "must not be empty"));
            }
            config.store.path = path.to_string();
        }
        if let Some(v) = section.get("auth_token") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.auth_token = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("timestamps") {
            config.store.timestamps = parse_choice::<TimestampMode>(
                "store",
                "timestamps",
                v,
                "must be 'server' or 'local'",
            )?;
        }
        if let Some(v) = section.get("request_timeout_secs") {
            config.store.request_timeout_secs = parse_positive(
                "store",
                "request_timeout_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
        }
    }

    // [consumer] section
    if let Some(section) = ini.section(Some("consumer")) {
        if let Some(v) = section.get("mode") {
            let v = v.trim().to_lowercase();
            if v != "push" && v != "poll" {
                return Err(invalid("consumer", "mode", &v, "must be 'push' or 'poll'"));
            }
            config.consumer.mode = v;
        }
        if let Some(v) = section.get("poll_interval_ms") {
            let interval = parse_positive(
                "consumer",
                "poll_interval_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
            if interval < MIN_POLL_INTERVAL_MS {
                return Err(invalid(
                    "consumer",
                    "poll_interval_ms",
                    v,
                    &format!("must be at least {}", MIN_POLL_INTERVAL_MS),
                ));
            }
            config.consumer.poll_interval_ms = interval;
        }
    }

    // [producer] section
    if let Some(section) = ini.section(Some("producer")) {
        if let Some(v) = section.get("source") {
            config.producer.source = parse_choice::<SourceKind>(
                "producer",
                "source",
                v,
                "must be 'gpsd' or 'replay'",
            )?;
        }
        if let Some(v) = section.get("gpsd_host") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("producer", "gpsd_host", v, "must not be empty"));
            }
            config.producer.gpsd_host = v.to_string();
        }
        if let Some(v) = section.get("gpsd_port") {
            config.producer.gpsd_port = match v.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    return Err(invalid(
                        "producer",
                        "gpsd_port",
                        v,
                        "must be a port number between 1 and 65535",
                    ))
                }
            };
        }
        if let Some(v) = section.get("acquisition_timeout_secs") {
            config.producer.acquisition_timeout_secs = parse_positive(
                "producer",
                "acquisition_timeout_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
        }
        if let Some(v) = section.get("replay_file") {
            let v = v.trim();
            if !v.is_empty() {
                config.producer.replay_file = Some(expand_tilde(v));
            }
        }
        if let Some(v) = section.get("replay_interval_ms") {
            config.producer.replay_interval_ms = parse_positive(
                "producer",
                "replay_interval_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("replay_loop") {
            config.producer.replay_loop = parse_bool(v);
        }
    }

    if config.producer.source == SourceKind::Replay && config.producer.replay_file.is_none() {
        return Err(invalid(
            "producer",
            "replay_file",
            "",
            "required when source = replay",
        ));
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_choice<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<u64, ConfigFileError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(section, key, value, reason)),
    }
}

/// Parse a boolean value from a string.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
