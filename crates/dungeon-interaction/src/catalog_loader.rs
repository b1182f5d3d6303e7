//! Lazy model catalog loading.

use dungeon_core::catalog::{CatalogSource, build_catalog};
use dungeon_core::error::Result;
use dungeon_core::state::StateStore;
use tokio::sync::Mutex;

/// What [`ModelCatalogLoader::ensure_models_loaded`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOutcome {
    /// The state already had models; nothing was fetched.
    AlreadyLoaded,
    /// The catalog was fetched and `count` usable models were stored.
    Loaded { count: usize },
}

/// Fills the store's model list from a [`CatalogSource`] the first time it is
/// needed.
///
/// Concurrent callers are serialized, so a burst of calls on an empty store
/// still costs a single fetch.
#[derive(Debug)]
pub struct ModelCatalogLoader {
    store: StateStore,
    loading: Mutex<()>,
}

impl ModelCatalogLoader {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            loading: Mutex::new(()),
        }
    }

    /// Fetches and stores the catalog unless the store already holds models.
    ///
    /// On failure the error is logged and returned, and the model list is
    /// left untouched.
    pub async fn ensure_models_loaded(&self, source: &dyn CatalogSource) -> Result<CatalogOutcome> {
        let _loading = self.loading.lock().await;

        if self.store.has_models() {
            return Ok(CatalogOutcome::AlreadyLoaded);
        }

        tracing::info!("[Catalog] Fetching model catalog");
        let raw = match source.list_models().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("[Catalog] Failed to fetch models: {}", e);
                return Err(e);
            }
        };

        let fetched = raw.len();
        let models = build_catalog(raw);
        let count = models.len();
        self.store.set_models(models);

        tracing::info!(
            "[Catalog] Stored {} of {} models supporting content generation",
            count,
            fetched
        );
        Ok(CatalogOutcome::Loaded { count })
    }
}
