//! Environment variable names used by this crate for configuring a
//! [`CaptureConfig`] without code changes.
//!
//! These are purely helpers ([`config_from_env`], [`CaptureConfig::from_env`]);
//! the service itself never reads the environment.

use crate::capture::CaptureConfig;
use crate::error::{CaptureError, Result};
use std::path::PathBuf;
use tokio::time::Duration;

/// Buffered records that force a flush.
pub const LOG_CAPTURE_BATCH_SIZE_ENV: &str = "LOG_CAPTURE_BATCH_SIZE";

/// Maximum age of a buffered record, in milliseconds.
pub const LOG_CAPTURE_THRESHOLD_MS_ENV: &str = "LOG_CAPTURE_THRESHOLD_MS";

/// Persist request/runtime/environment snapshots (`true`/`false`).
pub const LOG_CAPTURE_FULL_INFO_ENV: &str = "LOG_CAPTURE_FULL_INFO";

/// Render records to stdout.
pub const LOG_CAPTURE_CONSOLE_ENV: &str = "LOG_CAPTURE_CONSOLE";

/// Persist records to JSON files.
pub const LOG_CAPTURE_FILE_ENV: &str = "LOG_CAPTURE_FILE";

/// Default path template, e.g. `Logs/{Type}/{yyyy-MM-dd}.json`.
pub const LOG_CAPTURE_PATH_FORMAT_ENV: &str = "LOG_CAPTURE_PATH_FORMAT";

/// Directory relative templates resolve against.
pub const LOG_CAPTURE_BASE_DIR_ENV: &str = "LOG_CAPTURE_BASE_DIR";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Build a config from `LOG_CAPTURE_*` variables, starting from
/// [`CaptureConfig::default`].
pub fn config_from_env() -> Result<CaptureConfig> {
    config_from_lookup(|key| std::env::var(key).ok())
}

impl CaptureConfig {
    /// Shorthand for [`config_from_env`].
    pub fn from_env() -> Result<Self> {
        config_from_env()
    }
}

/// Same as [`config_from_env`] with an arbitrary key lookup.
pub fn config_from_lookup<F>(lookup: F) -> Result<CaptureConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = CaptureConfig::default();

    if let Some(value) = lookup(LOG_CAPTURE_BATCH_SIZE_ENV) {
        config.batch_size = parse_number(LOG_CAPTURE_BATCH_SIZE_ENV, &value)? as usize;
    }
    if let Some(value) = lookup(LOG_CAPTURE_THRESHOLD_MS_ENV) {
        config.threshold = Duration::from_millis(parse_number(LOG_CAPTURE_THRESHOLD_MS_ENV, &value)?);
    }
    if let Some(value) = lookup(LOG_CAPTURE_FULL_INFO_ENV) {
        config.log_full_info = parse_bool(LOG_CAPTURE_FULL_INFO_ENV, &value)?;
    }
    if let Some(value) = lookup(LOG_CAPTURE_CONSOLE_ENV) {
        config.enable_console = parse_bool(LOG_CAPTURE_CONSOLE_ENV, &value)?;
    }
    if let Some(value) = lookup(LOG_CAPTURE_FILE_ENV) {
        config.enable_file = parse_bool(LOG_CAPTURE_FILE_ENV, &value)?;
    }
    if let Some(value) = lookup(LOG_CAPTURE_PATH_FORMAT_ENV) {
        config.path_format = value;
    }
    if let Some(value) = lookup(LOG_CAPTURE_BASE_DIR_ENV) {
        config.base_dir = Some(PathBuf::from(value));
    }

    Ok(config)
}

fn invalid(key: &str, value: &str) -> CaptureError {
    CaptureError::Config {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
