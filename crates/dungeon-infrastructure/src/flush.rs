//! Sequenced, coalescing persistence of the app state.
//!
//! [`PersistenceFlusher`] is a [`StateListener`]: every committed mutation
//! drops a snapshot into a single-slot queue, and one background worker
//! writes whatever snapshot is newest. A burst of mutations therefore costs
//! at most one pending write, the last snapshot always wins, and a write
//! always completes before the next one starts.

use std::sync::{Arc, Mutex, PoisonError};

use dungeon_core::error::{DungeonError, Result};
use dungeon_core::state::{AppState, StateChange, StateListener, StateRepository, StateStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct Pending {
    generation: u64,
    state: AppState,
}

/// Background writer that keeps storage in sync with a [`StateStore`].
pub struct PersistenceFlusher {
    pending: watch::Sender<Option<Pending>>,
    completed: watch::Receiver<u64>,
    /// Generation of the latest queued snapshot.
    requested: Mutex<u64>,
    last_error: Arc<Mutex<Option<DungeonError>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceFlusher {
    /// Spawns the flush worker on the current tokio runtime.
    pub fn spawn(repository: Arc<dyn StateRepository>) -> Arc<Self> {
        let (pending_tx, pending_rx) = watch::channel(None);
        let (completed_tx, completed_rx) = watch::channel(0);
        let last_error = Arc::new(Mutex::new(None));

        let worker = tokio::spawn(run_worker(
            repository,
            pending_rx,
            completed_tx,
            Arc::clone(&last_error),
        ));

        Arc::new(Self {
            pending: pending_tx,
            completed: completed_rx,
            requested: Mutex::new(0),
            last_error,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Spawns a flusher and subscribes it to `store`.
    pub fn attach(store: &StateStore, repository: Arc<dyn StateRepository>) -> Arc<Self> {
        let flusher = Self::spawn(repository);
        store.subscribe(flusher.clone());
        flusher
    }

    /// Queues a snapshot for writing, replacing any snapshot not yet taken
    /// by the worker.
    pub fn enqueue(&self, state: AppState) {
        let mut requested = self
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *requested += 1;
        let replaced = self.pending.send_replace(Some(Pending {
            generation: *requested,
            state,
        }));
        if let Some(previous) = replaced {
            if previous.generation > *self.completed.borrow() {
                tracing::trace!("[Flush] Coalesced snapshot {}", previous.generation);
            }
        }
    }

    /// Waits until every snapshot queued before this call has been written
    /// (or has failed to write).
    pub async fn flushed(&self) -> Result<()> {
        let target = *self
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut completed = self.completed.clone();
        completed
            .wait_for(|done| *done >= target)
            .await
            .map(|_| ())
            .map_err(|_| DungeonError::storage("flush worker stopped"))
    }

    /// The error of the most recent failed write, if the latest write failed.
    pub fn last_error(&self) -> Option<DungeonError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Flushes pending writes and stops the worker.
    pub async fn shutdown(&self) -> Result<()> {
        let result = self.flushed().await;
        if let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            worker.abort();
        }
        tracing::debug!("[Flush] Worker stopped");
        result
    }
}

impl StateListener for PersistenceFlusher {
    fn on_change(&self, change: StateChange, state: &AppState) {
        tracing::trace!("[Flush] Queued snapshot after {:?}", change);
        self.enqueue(state.clone());
    }
}

impl Drop for PersistenceFlusher {
    fn drop(&mut self) {
        if let Some(worker) = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            worker.abort();
        }
    }
}

async fn run_worker(
    repository: Arc<dyn StateRepository>,
    mut pending: watch::Receiver<Option<Pending>>,
    completed: watch::Sender<u64>,
    last_error: Arc<Mutex<Option<DungeonError>>>,
) {
    while pending.changed().await.is_ok() {
        let Some(Pending { generation, state }) = pending.borrow_and_update().clone() else {
            continue;
        };

        let outcome = repository.save(&state).await;
        {
            let mut slot = last_error.lock().unwrap_or_else(PoisonError::into_inner);
            match outcome {
                Ok(()) => {
                    tracing::debug!("[Flush] Saved snapshot {}", generation);
                    *slot = None;
                }
                Err(e) => {
                    tracing::error!("[Flush] Failed to save snapshot {}: {}", generation, e);
                    *slot = Some(e);
                }
            }
        }

        completed.send_replace(generation);
    }
}
