//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PairlineSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `PAIRLINE_*` environment overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::PairlineSettings;

/// Resolve the default settings path (`~/.pairline/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pairline").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PairlineSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PairlineSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layer(path: &Path) -> Result<PairlineSettings> {
    let defaults = serde_json::to_value(PairlineSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (the file/default value stays).
pub fn apply_env_overrides(settings: &mut PairlineSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
fn apply_overrides(settings: &mut PairlineSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("PAIRLINE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = string("PAIRLINE_PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "PAIRLINE_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = string("PAIRLINE_MAX_CONNECTIONS") {
        match parse_usize_range(&v, 1, 100_000) {
            Some(n) => settings.server.max_connections = n,
            None => {
                warn!(key = "PAIRLINE_MAX_CONNECTIONS", value = %v, "invalid usize env var, ignoring");
            }
        }
    }
    if let Some(v) = string("PAIRLINE_AUTH_DIR") {
        settings.sessions.auth_dir = v;
    }
    if let Some(v) = string("PAIRLINE_CLIENT_COMMAND") {
        settings.client.command = v;
    }
    if let Some(v) = string("PAIRLINE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("PAIRLINE_LOG_FORMAT") {
        match v.parse() {
            Ok(format) => settings.logging.format = format,
            Err(e) => warn!(key = "PAIRLINE_LOG_FORMAT", error = %e, "ignoring"),
        }
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
