//! TOML configuration file loading
//!
//! Supports `~/.config/mariusz/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MariuszConfigFile {
    #[serde(default)]
    pub telegram: TelegramFileConfig,

    #[serde(default)]
    pub database: DatabaseFileConfig,

    /// Poll loop timing
    #[serde(default)]
    pub daemon: DaemonFileConfig,

    #[serde(default)]
    pub events: EventsFileConfig,

    #[serde(default)]
    pub wiki: WikiFileConfig,

    #[serde(default)]
    pub occupancy: OccupancyFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelegramFileConfig {
    /// Bot token
    pub token: Option<String>,

    /// Home conversation, excluded from most broadcasts
    pub home_chat_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    /// SQLite file with known conversations
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaemonFileConfig {
    pub poll_timeout_secs: Option<u64>,
    pub network_backoff_secs: Option<u64>,
    pub crash_cooldown_secs: Option<u64>,
    pub send_timeout_secs: Option<u64>,
}

/// Interval and debounce shared by every check section
#[derive(Debug, Default, Deserialize)]
pub struct CheckFileConfig {
    pub enabled: Option<bool>,
    pub check_interval_secs: Option<u64>,
    pub debounce_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsFileConfig {
    #[serde(flatten)]
    pub check: CheckFileConfig,

    /// iCalendar listing URL
    pub url: Option<String>,

    /// Only events whose title matches
    pub title_regex: Option<String>,

    pub lead_time_secs: Option<u64>,
    pub failure_limit: Option<u32>,
    pub retry_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WikiFileConfig {
    #[serde(flatten)]
    pub check: CheckFileConfig,

    /// Wiki base URL
    pub url: Option<String>,

    /// Atom feed URL, defaults to `{url}.atom`
    pub feed_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OccupancyFileConfig {
    #[serde(flatten)]
    pub check: CheckFileConfig,

    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Load the TOML config file
///
/// With an explicit `path` the file must exist and parse. Without one the
/// standard path is tried and a missing or broken file falls back to
/// `MariuszConfigFile::default()`.
///
/// # Errors
///
/// Returns error if an explicitly requested file cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<MariuszConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(MariuszConfigFile::default());
    };

    if !path.exists() {
        return Ok(MariuszConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(MariuszConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(MariuszConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/mariusz/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("mariusz").join("config.toml"))
}
