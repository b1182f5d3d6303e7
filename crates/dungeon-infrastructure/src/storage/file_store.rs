//! Directory-backed key-value store: one `<key>.json` file per entry.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dungeon_core::{DungeonError, Result};

use super::{AtomicFile, KeyValueStore};

/// Stores each entry as its own file under `base_dir`.
///
/// File access runs on the blocking pool so callers on the async runtime are
/// never stalled by disk I/O.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_for(&self, key: &str) -> Result<AtomicFile> {
        validate_key(key)?;
        Ok(AtomicFile::new(self.base_dir.join(format!("{key}.json"))))
    }
}

/// Keys become file names, so only a conservative character set is allowed.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(DungeonError::storage(format!("Invalid storage key: '{key}'")))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DungeonError::internal(format!("Failed to join task: {}", e)))?
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file_for(key)?;
        run_blocking(move || file.load()).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let file = self.file_for(key)?;
        let len = value.len();
        let value = value.to_string();
        run_blocking(move || file.save(&value)).await?;
        tracing::debug!("[Storage] Wrote '{}' ({} bytes)", key, len);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let file = self.file_for(key)?;
        run_blocking(move || file.remove()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_get_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp_dir.path().join("storage"));

        assert!(store.get("AI_DUNGEON_APP").await.unwrap().is_none());

        store.set("AI_DUNGEON_APP", "{\"x\":1}").await.unwrap();
        assert_eq!(
            store.get("AI_DUNGEON_APP").await.unwrap().as_deref(),
            Some("{\"x\":1}")
        );
        assert!(temp_dir.path().join("storage/AI_DUNGEON_APP.json").exists());

        assert!(store.remove("AI_DUNGEON_APP").await.unwrap());
        assert!(store.get("AI_DUNGEON_APP").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp_dir.path());

        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(store.set(key, "v").await.is_err(), "key {key:?} accepted");
        }
    }
}
