//! Configuration file support for Focus Garden.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/focus-garden/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub garden: GardenConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Starter kit and grid sizing for newly created gardens
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GardenConfig {
    #[serde(default = "default_starter_inventory")]
    pub starter_inventory: BTreeMap<String, u32>,

    #[serde(default)]
    pub starting_dew: u64,

    #[serde(default = "default_grid_columns")]
    pub grid_columns: u32,

    #[serde(default = "default_grid_rows")]
    pub grid_rows: u32,

    /// Optional TOML species catalog replacing the built-in one
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            starter_inventory: default_starter_inventory(),
            starting_dew: 0,
            grid_columns: default_grid_columns(),
            grid_rows: default_grid_rows(),
            catalog_path: None,
        }
    }
}

/// Persistence behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Retries after a lost optimistic-concurrency race
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("focus-garden")
}

fn default_starter_inventory() -> BTreeMap<String, u32> {
    BTreeMap::from([("pine-tree".to_string(), 3)])
}

fn default_grid_columns() -> u32 {
    6
}

fn default_grid_rows() -> u32 {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("focus-garden").join("config.toml")
    }

    /// Reject settings the engine can't work with
    pub fn validate(&self) -> Result<()> {
        if self.garden.grid_columns == 0 {
            return Err(Error::Config("garden.grid_columns must be at least 1".into()));
        }
        if self.garden.grid_rows == 0 {
            return Err(Error::Config("garden.grid_rows must be at least 1".into()));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
