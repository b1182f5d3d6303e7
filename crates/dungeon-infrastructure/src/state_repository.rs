//! Application state repository implementation.
//!
//! Persists the whole [`AppState`] as one JSON document under a fixed key of
//! a [`KeyValueStore`].

use std::sync::Arc;

use async_trait::async_trait;
use dungeon_core::config::STORAGE_KEY;
use dungeon_core::error::{DungeonError, Result};
use dungeon_core::state::{AppState, LoadedState, StateOrigin, StateRepository};

use crate::storage::KeyValueStore;

/// [`StateRepository`] over any key-value store.
///
/// # Example
///
/// ```ignore
/// use dungeon_infrastructure::{KeyValueStateRepository, MemoryKeyValueStore};
///
/// let repo = KeyValueStateRepository::new(Arc::new(MemoryKeyValueStore::new()));
/// let loaded = repo.load().await?;
/// assert!(loaded.is_default());
/// ```
#[derive(Clone)]
pub struct KeyValueStateRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl KeyValueStateRepository {
    /// Creates a repository using the standard storage key.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl StateRepository for KeyValueStateRepository {
    async fn load(&self) -> Result<LoadedState> {
        let Some(raw) = self.store.get(&self.key).await? else {
            tracing::info!("[StateRepository] No saved state under '{}', using defaults", self.key);
            return Ok(LoadedState {
                state: AppState::default(),
                origin: StateOrigin::Missing,
            });
        };

        match serde_json::from_str::<AppState>(&raw) {
            Ok(mut state) => {
                state.credential = AppState::normalize_credential(&state.credential);
                tracing::info!(
                    "[StateRepository] Loaded state: {} turns, {} models",
                    state.history.len(),
                    state.models.len()
                );
                Ok(LoadedState {
                    state,
                    origin: StateOrigin::Stored,
                })
            }
            Err(e) => {
                tracing::warn!(
                    "[StateRepository] Saved state under '{}' is unreadable, using defaults: {}",
                    self.key,
                    e
                );
                Ok(LoadedState {
                    state: AppState::default(),
                    origin: StateOrigin::Corrupted {
                        reason: e.to_string(),
                    },
                })
            }
        }
    }

    async fn save(&self, state: &AppState) -> Result<()> {
        // serde_json writes NaN and infinities as `null`, which would not load back.
        if !AppState::is_valid_temperature(state.temperature) {
            return Err(DungeonError::invalid_input(format!(
                "Refusing to save non-finite temperature {}",
                state.temperature
            )));
        }
        let json = serde_json::to_string(state)?;
        self.store.set(&self.key, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use dungeon_core::state::{FALLBACK_API_KEY, ModelDescriptor, Turn};

    fn repo_with(store: MemoryKeyValueStore) -> KeyValueStateRepository {
        KeyValueStateRepository::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_load_empty_storage_returns_seeded_default() {
        let loaded = repo_with(MemoryKeyValueStore::new()).load().await.unwrap();

        assert_eq!(loaded.origin, StateOrigin::Missing);
        assert_eq!(loaded.state.history, dungeon_core::state::seeded_history());
        assert!(loaded.state.models.is_empty());
        assert_eq!(loaded.state.credential, FALLBACK_API_KEY);
    }

    #[tokio::test]
    async fn test_load_valid_document_without_defaults() {
        let stored = r#"{"apiKey":"X","history":[],"models":[],"selectedModel":"m1","temperature":0.5,"systemInstruction":"s"}"#;
        let repo = repo_with(MemoryKeyValueStore::with_entry(STORAGE_KEY, stored));

        let loaded = repo.load().await.unwrap();

        assert_eq!(loaded.origin, StateOrigin::Stored);
        assert!(!loaded.is_default());
        assert_eq!(loaded.state.temperature, 0.5);
        assert!(loaded.state.history.is_empty());
        assert_eq!(loaded.state.credential, "X");
        assert_eq!(loaded.state.selected_model, "m1");
        assert_eq!(loaded.state.system_instruction, "s");
    }

    #[tokio::test]
    async fn test_load_corrupted_document_is_distinguishable() {
        let repo = repo_with(MemoryKeyValueStore::with_entry(STORAGE_KEY, "{not json"));

        let loaded = repo.load().await.unwrap();

        assert!(matches!(loaded.origin, StateOrigin::Corrupted { .. }));
        assert_eq!(loaded.state, AppState::default());
    }

    #[tokio::test]
    async fn test_load_repairs_empty_credential() {
        let stored = r#"{"apiKey":"","history":[],"selectedModel":"m1","temperature":1,"systemInstruction":"s"}"#;
        let repo = repo_with(MemoryKeyValueStore::with_entry(STORAGE_KEY, stored));

        let loaded = repo.load().await.unwrap();

        assert_eq!(loaded.origin, StateOrigin::Stored);
        assert_eq!(loaded.state.credential, FALLBACK_API_KEY);
        assert!(loaded.state.models.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let repo = repo_with(MemoryKeyValueStore::new());
        let mut state = AppState::default();
        state.credential = " secret ".to_string();
        state.temperature = 0.25;
        state.history.push(Turn::user("hi"));
        state.models = vec![ModelDescriptor {
            name: "gemini-2.5-pro".to_string(),
            display_name: "Gemini 2.5 Pro".to_string(),
            supported_actions: vec!["generateContent".to_string()],
        }];

        repo.save(&state).await.unwrap();
        let loaded = repo.load().await.unwrap();

        assert_eq!(loaded.origin, StateOrigin::Stored);
        assert_eq!(loaded.state, state);
        assert_eq!(loaded.state.credential, " secret ");
    }

    #[tokio::test]
    async fn test_save_rejects_non_finite_temperature() {
        let store = MemoryKeyValueStore::new();
        let repo = repo_with(store.clone());
        let mut state = AppState::default();
        state.history.push(Turn::user("keep me"));
        repo.save(&state).await.unwrap();

        for bad in [f64::NAN, f64::INFINITY] {
            let mut broken = state.clone();
            broken.temperature = bad;
            assert!(repo.save(&broken).await.unwrap_err().is_invalid_input());
        }

        assert_eq!(store.write_count(), 1);
        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.origin, StateOrigin::Stored);
        assert_eq!(loaded.state.history, state.history);
    }

    #[tokio::test]
    async fn test_load_null_temperature_keeps_history() {
        let stored = r#"{"apiKey":"X","history":[{"role":"user","parts":[{"text":"hi"}]}],"models":[],"selectedModel":"m1","temperature":null,"systemInstruction":"s"}"#;
        let repo = repo_with(MemoryKeyValueStore::with_entry(STORAGE_KEY, stored));

        let loaded = repo.load().await.unwrap();

        assert_eq!(loaded.origin, StateOrigin::Stored);
        assert_eq!(loaded.state.temperature, AppState::default().temperature);
        assert_eq!(loaded.state.history, vec![Turn::user("hi")]);
    }

    #[tokio::test]
    async fn test_load_document_missing_fields_keeps_history() {
        let stored = r#"{"apiKey":"X","history":[{"role":"user","parts":[{"text":"hi"}]}]}"#;
        let repo = repo_with(MemoryKeyValueStore::with_entry(STORAGE_KEY, stored));

        let loaded = repo.load().await.unwrap();
        let defaults = AppState::default();

        assert_eq!(loaded.origin, StateOrigin::Stored);
        assert_eq!(loaded.state.history, vec![Turn::user("hi")]);
        assert_eq!(loaded.state.selected_model, defaults.selected_model);
        assert_eq!(loaded.state.temperature, defaults.temperature);
        assert_eq!(loaded.state.system_instruction, defaults.system_instruction);
    }

    #[tokio::test]
    async fn test_custom_key() {
        let store = MemoryKeyValueStore::new();
        let repo = KeyValueStateRepository::with_key(Arc::new(store.clone()), "other");

        repo.save(&AppState::default()).await.unwrap();

        assert!(store.get("other").await.unwrap().is_some());
        assert!(store.get(STORAGE_KEY).await.unwrap().is_none());
    }
}
