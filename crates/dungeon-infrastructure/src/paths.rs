//! Unified path management for dungeon configuration and data files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/dungeon/           # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/dungeon/      # Data directory
//! ├── storage/                 # Key-value store (one <key>.json per entry)
//! │   └── AI_DUNGEON_APP.json
//! └── logs/                    # Application logs
//!     └── dungeon.log.YYYY-MM-DD
//! ```

use std::path::{Path, PathBuf};

use dungeon_core::config::DungeonConfig;

const APP_DIR_NAME: &str = "dungeon";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for dungeon_core::DungeonError {
    fn from(err: PathError) -> Self {
        dungeon_core::DungeonError::config(err.to_string())
    }
}

/// Path resolver for dungeon.
///
/// With a base path every directory lives under it (used by tests and
/// portable installs); without one the platform config/data directories
/// from `dirs` are used.
#[derive(Debug, Clone, Default)]
pub struct DungeonPaths {
    base: Option<PathBuf>,
}

impl DungeonPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    /// Returns the dungeon configuration directory (e.g. `~/.config/dungeon/`).
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.join("config")),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Returns the dungeon data directory (e.g. `~/.local/share/dungeon/`).
    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.join("data")),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Returns the path to `config.toml`.
    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the key-value storage directory.
    pub fn storage_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("storage"))
    }

    /// Returns the logs directory.
    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("logs"))
    }

    /// Fills unset directories of `config` with the resolved defaults.
    pub fn apply_defaults(&self, mut config: DungeonConfig) -> Result<DungeonConfig, PathError> {
        if config.storage_dir.is_none() {
            config.storage_dir = Some(self.storage_dir()?);
        }
        if config.log_dir.is_none() {
            config.log_dir = Some(self.logs_dir()?);
        }
        Ok(config)
    }
}
