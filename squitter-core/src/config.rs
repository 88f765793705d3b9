//! Configuration file management for squitter.
//!
//! Reads/writes `~/.squitter/config.toml` with the CPR timing windows,
//! the optional receiver location, and the raw feed address.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::Coordinates;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub feed: FeedConfig,
}

/// Tunables for CPR pairing and track housekeeping. All times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Max arrival gap between an even and odd frame for global decoding.
    pub pair_window_secs: f64,
    /// Max age of a resolved position used as a local-decode reference.
    pub reference_max_age_secs: f64,
    /// Tracks silent for longer than this are evicted.
    pub idle_timeout_secs: f64,
    /// Reject extended squitters whose CRC remainder is non-zero.
    pub require_crc: bool,
    /// Fixed receiver location, used for local decoding when an aircraft
    /// has no fresh reference of its own.
    pub receiver: Option<Coordinates>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            pair_window_secs: 10.0,
            reference_max_age_secs: 10.0,
            idle_timeout_secs: 300.0,
            require_crc: false,
            receiver: None,
        }
    }
}

/// Where the raw frame feed (dump1090 `--net` raw output) lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            host: "127.0.0.1".into(),
            port: 30002,
        }
    }
}

/// Get the config directory path (`~/.squitter/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".squitter")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.squitter/config.toml`.
///
/// Returns the default config if the file doesn't exist.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_file();
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load_config_from(&path)
}

/// Load config from an explicit path. Missing keys take their defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Write config to `path`, creating parent directories as needed.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
