//! Key-value storage backends.
//!
//! The persisted app state is a single string entry in a [`KeyValueStore`];
//! the store knows nothing about its content.

mod atomic_file;
mod file_store;
mod memory_store;

pub use atomic_file::AtomicFile;
pub use file_store::FileKeyValueStore;
pub use memory_store::MemoryKeyValueStore;

use async_trait::async_trait;
use dungeon_core::Result;

/// String-keyed, string-valued storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Returns `false` if nothing was stored.
    async fn remove(&self, key: &str) -> Result<bool>;
}
