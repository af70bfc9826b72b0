//! Logpipe configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dispatchq::QueueConfig;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::consumers::FileFormat;
use crate::level::Level;

/// Main logpipe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum level of records passed to consumers
    pub level: Level,

    /// Level of logpipe's own diagnostics (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Console consumer settings
    pub console: ConsoleConfig,

    /// File consumer settings; no file output when absent
    pub file: Option<FileConfig>,

    /// Tags attached to every record
    pub tags: BTreeMap<String, String>,

    /// Dispatcher worker settings
    pub queue: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Level::Info,
            log_level: None,
            console: ConsoleConfig::default(),
            file: None,
            tags: BTreeMap::new(),
            queue: QueueConfig::named("logpipe"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: ./logpipe.yml
        let local_config = PathBuf::from("logpipe.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/logpipe/logpipe.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("logpipe").join("logpipe.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the diagnostics level, before logging is set up.
    ///
    /// Any failure yields `None`; the full load reports it later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => [
                Some(PathBuf::from("logpipe.yml")),
                dirs::config_dir().map(|d| d.join("logpipe").join("logpipe.yml")),
            ]
            .into_iter()
            .flatten()
            .find(|p| p.exists())?,
        };
        Self::load_from_file(&path).ok()?.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Console consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Write records to stdout
    pub enabled: bool,

    /// Colorize the level column
    pub color: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            color: true,
        }
    }
}

/// File consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// File to append to
    pub path: PathBuf,

    /// Line format
    #[serde(default)]
    pub format: FileFormat,

    /// Write from a dedicated thread instead of the dispatcher's
    #[serde(default, rename = "own-thread")]
    pub own_thread: bool,
}
