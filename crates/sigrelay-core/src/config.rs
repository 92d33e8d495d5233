//! Configuration resolution for sigrelay.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`~/.config/sigrelay/settings.json`)
//! 3. Explicit config file (`--config` / `SIGRELAY_CONFIG`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binaries)
//!
//! Config files may be partial; only the keys they contain override the
//! layers below them.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Complete sigrelay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// TCP bind address.
    pub addr: SocketAddr,
    /// Upper bound on how long an idle drain stream waits before re-checking
    /// the queue.
    pub poll_interval_ms: u64,
    /// Per-stream response channel capacity.
    pub stream_buffer: usize,
    pub keepalive_interval_secs: u64,
    pub keepalive_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            poll_interval_ms: 100,
            stream_buffer: 16,
            keepalive_interval_secs: 30,
            keepalive_timeout_secs: 10,
        }
    }
}

impl ServerSettings {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
///
/// A missing global file is skipped; a missing `explicit` file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut layers = Vec::new();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            layers.push(read_config_file(&global_path)?);
        }
    }

    if let Some(path) = explicit {
        layers.push(read_config_file(path)?);
    }

    let mut config = resolve_layers(layers)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    let dir = dirs::config_dir()?;
    Some(dir.join("sigrelay").join("settings.json"))
}

fn read_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Overlay each layer onto the defaults, in order, and deserialize the result.
fn resolve_layers(layers: Vec<Value>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;
    for layer in layers {
        merge_json(&mut merged, layer);
    }
    serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `SIGRELAY_*` environment overrides, reading variables through
/// `lookup` so tests need not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("SIGRELAY_ADDR") {
        config.server.addr = parse_env("SIGRELAY_ADDR", &val)?;
    }
    if let Some(val) = lookup("SIGRELAY_POLL_INTERVAL_MS") {
        config.server.poll_interval_ms = parse_env("SIGRELAY_POLL_INTERVAL_MS", &val)?;
    }
    if let Some(val) = lookup("SIGRELAY_STREAM_BUFFER") {
        config.server.stream_buffer = parse_env("SIGRELAY_STREAM_BUFFER", &val)?;
    }
    if let Some(val) = lookup("SIGRELAY_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = lookup("SIGRELAY_LOG_JSON") {
        config.logging.json = parse_env("SIGRELAY_LOG_JSON", &val)?;
    }
    Ok(())
}

fn parse_env<T>(key: &str, val: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    val.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {key} ({val:?}): {e}")))
}
