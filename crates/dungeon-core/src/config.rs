//! Runtime configuration.
//!
//! Read from an optional `config.toml`; every field has a default so an
//! absent file (or an empty one) yields a working configuration.
//!
//! ```toml
//! storage_dir = "/home/me/.local/share/dungeon"
//! storage_key = "AI_DUNGEON_APP"
//! api_base_url = "https://generativelanguage.googleapis.com/v1beta"
//! request_timeout_secs = 60
//! log_dir = "/home/me/.local/share/dungeon/logs"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DungeonError, Result};

/// Key the app state document is stored under.
pub const STORAGE_KEY: &str = "AI_DUNGEON_APP";

/// Gemini REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonConfig {
    /// Directory holding the key-value store. `None` keeps state in memory.
    pub storage_dir: Option<PathBuf>,
    pub storage_key: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl Default for DungeonConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            storage_key: STORAGE_KEY.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_dir: None,
        }
    }
}

impl DungeonConfig {
    /// Loads the configuration from `path`, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("[Config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DungeonError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no session could run with.
    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(DungeonError::config("storage_key must not be empty"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(DungeonError::config("api_base_url must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(DungeonError::config("request_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = DungeonConfig::load(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, DungeonConfig::default());
        assert_eq!(config.storage_key, "AI_DUNGEON_APP");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "request_timeout_secs = 5\n").unwrap();

        let config = DungeonConfig::load(&path).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        std::fs::write(&path, "request_timeout_secs = 0\n").unwrap();
        assert!(DungeonConfig::load(&path).unwrap_err().to_string().contains("positive"));

        std::fs::write(&path, "request_timeout_secs = \"soon\"\n").unwrap();
        assert!(DungeonConfig::load(&path).unwrap_err().is_serialization());
    }
}
