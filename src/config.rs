//! Configuration loading and management.

use crate::sync::views::SortKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the board database and config, relative to the working dir or home.
pub const CONFIG_DIR: &str = ".taskboard";

/// Board configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub view: ViewConfig,
}

/// Remote store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("board.db")
}

/// Mutation engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiescence window for free-text writes, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Columns whose remote writes go through the debouncer.
    #[serde(default = "default_debounced_columns")]
    pub debounced_columns: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            debounced_columns: default_debounced_columns(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_debounced_columns() -> Vec<String> {
    vec!["title".to_string(), "description".to_string()]
}

impl SyncConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn is_debounced(&self, column: &str) -> bool {
        self.debounced_columns.iter().any(|c| c == column)
    }
}

/// Presentation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_sort")]
    pub default_sort: SortKey,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_sort: default_sort(),
        }
    }
}

fn default_sort() -> SortKey {
    SortKey::CreatedAt
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Candidate config files, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_DIR).join("config.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_DIR).join("config.yaml"));
        }
        paths
    }

    /// Load from an explicit path, else the first existing default location, else defaults.
    /// Environment overrides are applied on top.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::search_paths()
                .into_iter()
                .find(|p| p.is_file())
                .map(Self::load)
                .transpose()?
                .unwrap_or_default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `TASKBOARD_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("TASKBOARD_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Ok(ms) = std::env::var("TASKBOARD_DEBOUNCE_MS")
            && let Ok(ms) = ms.parse()
        {
            self.sync.debounce_ms = ms;
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
