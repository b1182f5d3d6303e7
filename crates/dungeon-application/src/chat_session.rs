//! Chat session: wires storage, state, persistence and the remote client,
//! and runs the send-message flow.

use std::sync::Arc;

use anyhow::Context;
use dungeon_core::catalog::CatalogSource;
use dungeon_core::config::DungeonConfig;
use dungeon_core::contract::RoleplayReply;
use dungeon_core::error::{DungeonError, Result};
use dungeon_core::generation::{ContentGenerator, GenerationRequest};
use dungeon_core::state::{StateOrigin, StateRepository, StateStore, Turn};
use dungeon_infrastructure::{
    DungeonPaths, FileKeyValueStore, KeyValueStateRepository, KeyValueStore, MemoryKeyValueStore,
    PersistenceFlusher,
};
use dungeon_interaction::{
    CatalogOutcome, ClientFactory, ClientHandle, GeminiApiClient, GeminiClientFactory,
    ModelCatalogLoader,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A remote client usable by a [`ChatSession`].
pub trait RemoteClient: ContentGenerator + CatalogSource + 'static {}

impl<T> RemoteClient for T where T: ContentGenerator + CatalogSource + 'static {}

/// One running role-play conversation.
///
/// Every state mutation made through the session is committed to the shared
/// [`StateStore`], which notifies the persistence flusher and the client
/// handle.
pub struct ChatSession<C: RemoteClient = GeminiApiClient> {
    store: StateStore,
    origin: StateOrigin,
    flusher: Arc<PersistenceFlusher>,
    client: Arc<ClientHandle<C>>,
    catalog: Arc<ModelCatalogLoader>,
    /// Catalog load started by [`ChatSession::open`], until someone awaits it.
    startup_catalog: Mutex<Option<JoinHandle<Result<CatalogOutcome>>>>,
    /// Keeps one send-message flow at a time so turns never interleave.
    sending: Mutex<()>,
}

impl ChatSession<GeminiApiClient> {
    /// Builds a session from `config`: file storage when `storage_dir` is set,
    /// memory otherwise, and a Gemini client for the stored credential.
    pub async fn bootstrap(config: DungeonConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let kv: Arc<dyn KeyValueStore> = match &config.storage_dir {
            Some(dir) => {
                tracing::info!("[Bootstrap] Using file storage at {}", dir.display());
                Arc::new(FileKeyValueStore::new(dir))
            }
            None => {
                tracing::info!("[Bootstrap] Using in-memory storage");
                Arc::new(MemoryKeyValueStore::new())
            }
        };
        let repository = Arc::new(KeyValueStateRepository::with_key(
            kv,
            config.storage_key.clone(),
        ));

        let session = Self::open(repository, GeminiClientFactory::new(config))
            .await
            .context("Failed to open chat session")?;
        Ok(session)
    }

    /// Loads `config.toml` from the platform config directory (or `base`),
    /// fills in default directories and bootstraps.
    pub async fn bootstrap_from_paths(paths: &DungeonPaths) -> anyhow::Result<Self> {
        let config_file = paths.config_file()?;
        let config = DungeonConfig::load(&config_file)
            .with_context(|| format!("Failed to load {}", config_file.display()))?;
        let config = paths.apply_defaults(config)?;
        Self::bootstrap(config).await
    }
}

impl<C: RemoteClient> ChatSession<C> {
    /// Loads state from `repository` and attaches persistence and a client
    /// built by `factory`.
    ///
    /// Also starts loading the model catalog in the background. A failed load
    /// is logged and leaves the session usable with no models; see
    /// [`ChatSession::wait_for_models`].
    pub async fn open(
        repository: Arc<dyn StateRepository>,
        factory: impl ClientFactory<C> + 'static,
    ) -> Result<Self> {
        let loaded = repository.load().await?;
        match &loaded.origin {
            StateOrigin::Stored => tracing::info!("[Bootstrap] Restored saved state"),
            StateOrigin::Missing => tracing::info!("[Bootstrap] Starting with default state"),
            StateOrigin::Corrupted { reason } => {
                tracing::warn!("[Bootstrap] Saved state discarded: {}", reason)
            }
        }

        let store = StateStore::new(loaded.state);
        let flusher = PersistenceFlusher::attach(&store, repository);
        let client = ClientHandle::attach(&store, factory)?;
        let catalog = Arc::new(ModelCatalogLoader::new(store.clone()));
        let startup_catalog = Self::spawn_catalog_load(catalog.clone(), client.clone());

        Ok(Self {
            store,
            origin: loaded.origin,
            flusher,
            client,
            catalog,
            startup_catalog: Mutex::new(Some(startup_catalog)),
            sending: Mutex::new(()),
        })
    }

    fn spawn_catalog_load(
        catalog: Arc<ModelCatalogLoader>,
        client: Arc<ClientHandle<C>>,
    ) -> JoinHandle<Result<CatalogOutcome>> {
        tokio::spawn(async move {
            let source = client.client();
            let outcome = catalog.ensure_models_loaded(source.as_ref()).await;
            if outcome.is_err() {
                tracing::warn!("[Bootstrap] Continuing without a model catalog");
            }
            outcome
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Where the initial state came from.
    pub fn origin(&self) -> &StateOrigin {
        &self.origin
    }

    /// The client bound to the current credential.
    pub fn client(&self) -> Arc<C> {
        self.client.client()
    }

    /// Sends `text` as the next user turn and returns the validated reply.
    ///
    /// The user turn stays in the history even when generation or validation
    /// fails; the model turn is appended only for a valid reply.
    pub async fn send_message(&self, text: &str) -> Result<RoleplayReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DungeonError::invalid_input("Message must not be empty"));
        }

        let _sending = self.sending.lock().await;

        self.store.push_turn(Turn::user(text));
        let request = self.store.read(GenerationRequest::from_state);
        let client = self.client.client();

        let raw = client.generate(&request).await.inspect_err(|e| {
            tracing::error!("[Session] Generation with {} failed: {}", request.model, e);
        })?;

        let reply = RoleplayReply::parse(&raw).inspect_err(|e| {
            tracing::warn!("[Session] Discarding reply: {}", e);
        })?;

        self.store.push_turn(Turn::model(raw));
        Ok(reply)
    }

    /// Sends the `index`-th option of the latest reply as the next message.
    pub async fn choose_option(&self, index: usize) -> Result<RoleplayReply> {
        let reply = self
            .latest_reply()
            .ok_or_else(|| DungeonError::invalid_input("No reply with options yet"))?;
        let option = reply.option(index).ok_or_else(|| {
            DungeonError::invalid_input(format!(
                "Option {index} out of range (reply has {})",
                reply.options.len()
            ))
        })?;
        self.send_message(option).await
    }

    /// The latest model turn, if it is a contract-shaped reply.
    pub fn latest_reply(&self) -> Option<RoleplayReply> {
        let text = self
            .store
            .read(|state| state.last_model_turn().map(Turn::text))?;
        RoleplayReply::parse(&text).ok()
    }

    /// Loads the model catalog if the state has none yet.
    pub async fn refresh_models(&self) -> Result<CatalogOutcome> {
        let client = self.client.client();
        self.catalog.ensure_models_loaded(client.as_ref()).await
    }

    /// Waits for the catalog load started at open and returns its result.
    ///
    /// Once that result has been taken, this behaves like
    /// [`ChatSession::refresh_models`].
    pub async fn wait_for_models(&self) -> Result<CatalogOutcome> {
        let startup = self.startup_catalog.lock().await.take();
        match startup {
            Some(task) => task.await.map_err(|e| {
                DungeonError::internal(format!("Startup catalog load did not finish: {e}"))
            })?,
            None => self.refresh_models().await,
        }
    }

    pub fn set_credential(&self, credential: &str) -> bool {
        self.store.set_credential(credential)
    }

    pub fn select_model(&self, name: &str) -> bool {
        self.store.select_model(name)
    }

    pub fn set_temperature(&self, temperature: f64) -> bool {
        self.store.set_temperature(temperature)
    }

    pub fn set_system_instruction(&self, instruction: &str) -> bool {
        self.store.set_system_instruction(instruction)
    }

    /// Starts a fresh conversation.
    pub fn clear_history(&self) -> bool {
        self.store.clear_history()
    }

    /// Waits for every mutation so far to reach storage.
    pub async fn flushed(&self) -> Result<()> {
        self.flusher.flushed().await
    }

    /// The error of the latest storage write, if it failed.
    pub fn flush_error(&self) -> Option<DungeonError> {
        self.flusher.last_error()
    }

    /// Flushes pending writes and stops the flush worker.
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!("[Session] Shutting down");
        if let Some(task) = self.startup_catalog.lock().await.take() {
            task.abort();
        }
        self.flusher.shutdown().await
    }
}
