//! Credential-keyed remote client.
//!
//! [`ClientHandle`] subscribes to the [`StateStore`] and swaps in a freshly
//! built client whenever a committed mutation changes the credential. The
//! old client is dropped once the last in-flight caller releases it.

use std::sync::{Arc, PoisonError, RwLock};

use dungeon_core::config::DungeonConfig;
use dungeon_core::error::Result;
use dungeon_core::state::{AppState, StateChange, StateListener, StateStore};

use crate::gemini_api_client::GeminiApiClient;

/// Builds a client bound to one credential.
pub trait ClientFactory<C>: Send + Sync {
    fn create(&self, credential: &str) -> Result<C>;
}

impl<C, F> ClientFactory<C> for F
where
    F: Fn(&str) -> Result<C> + Send + Sync,
{
    fn create(&self, credential: &str) -> Result<C> {
        self(credential)
    }
}

/// Builds [`GeminiApiClient`]s with the endpoint and timeout from config.
#[derive(Debug, Clone, Default)]
pub struct GeminiClientFactory {
    config: DungeonConfig,
}

impl GeminiClientFactory {
    pub fn new(config: DungeonConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory<GeminiApiClient> for GeminiClientFactory {
    fn create(&self, credential: &str) -> Result<GeminiApiClient> {
        GeminiApiClient::from_config(credential, &self.config)
    }
}

struct Bound<C> {
    credential: String,
    client: Arc<C>,
}

/// The client matching the latest committed credential.
pub struct ClientHandle<C> {
    factory: Box<dyn ClientFactory<C>>,
    current: RwLock<Bound<C>>,
}

impl<C: Send + Sync + 'static> ClientHandle<C> {
    /// Builds the initial client for `credential`.
    pub fn new(factory: impl ClientFactory<C> + 'static, credential: &str) -> Result<Self> {
        let client = Arc::new(factory.create(credential)?);
        Ok(Self {
            factory: Box::new(factory),
            current: RwLock::new(Bound {
                credential: credential.to_string(),
                client,
            }),
        })
    }

    /// Builds a handle for the store's current credential and subscribes it.
    pub fn attach(store: &StateStore, factory: impl ClientFactory<C> + 'static) -> Result<Arc<Self>> {
        let handle = Arc::new(Self::new(factory, &store.credential())?);
        store.subscribe(handle.clone());
        Ok(handle)
    }

    /// Returns the current client.
    pub fn client(&self) -> Arc<C> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .client
            .clone()
    }

    /// Credential the current client was built with.
    pub fn credential(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .credential
            .clone()
    }

    fn rebind(&self, credential: &str) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if current.credential == credential {
            return;
        }

        match self.factory.create(credential) {
            Ok(client) => {
                *current = Bound {
                    credential: credential.to_string(),
                    client: Arc::new(client),
                };
                tracing::info!("[Client] Rebuilt remote client for new credential");
            }
            Err(e) => {
                tracing::error!("[Client] Failed to build client for new credential: {}", e);
            }
        }
    }
}

impl<C: Send + Sync + 'static> StateListener for ClientHandle<C> {
    fn on_change(&self, change: StateChange, state: &AppState) {
        if change.affects_credential() {
            self.rebind(&state.credential);
        }
    }
}
