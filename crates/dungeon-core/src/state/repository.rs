//! State repository trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::state::model::AppState;

/// Where a loaded [`AppState`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOrigin {
    /// A valid document was found in storage.
    Stored,
    /// Nothing was stored under the key; the built-in default was used.
    Missing,
    /// A document was stored but could not be parsed; the built-in default
    /// was used and the stored document will be overwritten on next save.
    Corrupted { reason: String },
}

/// Result of [`StateRepository::load`].
#[derive(Debug, Clone)]
pub struct LoadedState {
    pub state: AppState,
    pub origin: StateOrigin,
}

impl LoadedState {
    /// Whether the built-in default had to be used.
    pub fn is_default(&self) -> bool {
        !matches!(self.origin, StateOrigin::Stored)
    }
}

/// Repository for the persisted application state.
///
/// `load` never fails on missing or malformed data: both fall back to
/// [`AppState::default`] and are reported through [`LoadedState::origin`].
/// Errors are returned only when the storage backend itself fails.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Loads the app state, falling back to the built-in default.
    async fn load(&self) -> Result<LoadedState>;

    /// Saves the full app state, replacing whatever was stored.
    async fn save(&self, state: &AppState) -> Result<()>;
}
