//! Storage, path resolution and persistence for the dungeon client.
//!
//! - [`storage`]: string key-value backends (directory of files, or memory)
//! - [`state_repository`]: the [`StateRepository`](dungeon_core::state::StateRepository)
//!   that keeps the whole app state under one key
//! - [`flush`]: the background writer that mirrors store mutations to storage
//! - [`paths`]: platform directories for config, data and logs

pub mod flush;
pub mod paths;
pub mod state_repository;
pub mod storage;

pub use flush::PersistenceFlusher;
pub use paths::{DungeonPaths, PathError};
pub use state_repository::KeyValueStateRepository;
pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
