//! Configuration loaded from TOML.
//!
//! ```toml
//! [game]
//! grid_size = 4
//! time_limit_secs = 420
//! winning_tile = 512
//!
//! [sync]
//! base_url = "http://localhost:5130/api"
//! request_timeout_secs = 10
//! periodic_interval_secs = 30
//! periodic_min_play_secs = 10
//! exit_min_play_secs = 5
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{
    is_tile_value, SessionSettings, DEFAULT_GRID_SIZE, DEFAULT_TIME_LIMIT_SECS,
    DEFAULT_WINNING_TILE,
};
use crate::sync::{SyncSettings, DEFAULT_BASE_URL};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BAKERY_CONFIG";

/// Config file used when `BAKERY_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "bakery.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

fn default_grid_size() -> usize {
    DEFAULT_GRID_SIZE
}

fn default_time_limit_secs() -> u32 {
    DEFAULT_TIME_LIMIT_SECS
}

fn default_winning_tile() -> u32 {
    DEFAULT_WINNING_TILE
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_periodic_interval_secs() -> u64 {
    30
}

fn default_periodic_min_play_secs() -> u32 {
    10
}

fn default_exit_min_play_secs() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,

    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u32,

    /// Used until a tile table says otherwise
    #[serde(default = "default_winning_tile")]
    pub winning_tile: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            time_limit_secs: default_time_limit_secs(),
            winning_tile: default_winning_tile(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_periodic_interval_secs")]
    pub periodic_interval_secs: u64,

    #[serde(default = "default_periodic_min_play_secs")]
    pub periodic_min_play_secs: u32,

    #[serde(default = "default_exit_min_play_secs")]
    pub exit_min_play_secs: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            periodic_interval_secs: default_periodic_interval_secs(),
            periodic_min_play_secs: default_periodic_min_play_secs(),
            exit_min_play_secs: default_exit_min_play_secs(),
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_secs)
    }

    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            periodic_min_play_secs: self.periodic_min_play_secs,
            exit_min_play_secs: self.exit_min_play_secs,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Path from `BAKERY_CONFIG`, else `bakery.toml` in the working directory.
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load and validate a config file. A missing file gives the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: String| Err(ConfigError::ValidationError { message });

        if self.game.grid_size < 2 {
            return fail(format!(
                "grid_size must be at least 2, got {}",
                self.game.grid_size
            ));
        }
        if self.game.time_limit_secs == 0 {
            return fail("time_limit_secs must be positive".to_string());
        }
        if !is_tile_value(self.game.winning_tile) {
            return fail(format!(
                "winning_tile must be a power of two >= 2, got {}",
                self.game.winning_tile
            ));
        }
        if self.sync.periodic_interval_secs == 0 {
            return fail("periodic_interval_secs must be positive".to_string());
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            grid_size: self.game.grid_size,
            time_limit_secs: self.game.time_limit_secs,
            winning_tile: self.game.winning_tile,
        }
    }
}
