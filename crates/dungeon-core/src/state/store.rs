//! Observable application state container.
//!
//! [`StateStore`] is the single in-memory owner of [`AppState`]. Every
//! mutation goes through one of its methods; after a mutation is committed
//! all subscribed [`StateListener`]s are called synchronously, in
//! subscription order, with the kind of change and the committed state.
//! Persistence and the remote client wrapper are both plain listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::state::model::{AppState, DEFAULT_TEMPERATURE, ModelDescriptor, Turn};

/// The part of the state a committed mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    Credential,
    History,
    Models,
    SelectedModel,
    Temperature,
    SystemInstruction,
    /// The whole state was replaced.
    Replaced,
}

impl StateChange {
    /// Whether the credential may have changed.
    pub fn affects_credential(self) -> bool {
        matches!(self, Self::Credential | Self::Replaced)
    }
}

/// Observer of committed state mutations.
///
/// Listeners run on the mutating thread while the store serializes commits,
/// so they must not mutate the store themselves. Reading it is fine.
pub trait StateListener: Send + Sync {
    fn on_change(&self, change: StateChange, state: &AppState);
}

impl<F> StateListener for F
where
    F: Fn(StateChange, &AppState) + Send + Sync,
{
    fn on_change(&self, change: StateChange, state: &AppState) {
        self(change, state)
    }
}

/// Handle returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    state: RwLock<AppState>,
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn StateListener>)>>,
    /// Serializes commit + notify so listeners observe mutations in order.
    commit: Mutex<()>,
    next_id: AtomicU64,
}

/// Shared, observable [`AppState`] container.
///
/// Cloning the store clones the handle; all clones see the same state.
///
/// # Example
///
/// ```
/// use dungeon_core::state::{AppState, StateChange, StateStore, Turn};
///
/// let store = StateStore::new(AppState::default());
/// store.subscribe_fn(|change, state| {
///     if change == StateChange::History {
///         println!("{} turns", state.history.len());
///     }
/// });
/// store.push_turn(Turn::user("hi"));
/// ```
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Creates a store seeded with `state`.
    ///
    /// The credential is normalized so the store never holds an empty one.
    pub fn new(mut state: AppState) -> Self {
        state.credential = AppState::normalize_credential(&state.credential);
        if !AppState::is_valid_temperature(state.temperature) {
            state.temperature = DEFAULT_TEMPERATURE;
        }
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                listeners: Mutex::new(Vec::new()),
                commit: Mutex::new(()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    // ============================================================================
    // Subscriptions
    // ============================================================================

    /// Registers a listener called after every committed mutation.
    pub fn subscribe(&self, listener: Arc<dyn StateListener>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        tracing::debug!("[Store] Listener {:?} subscribed", id);
        id
    }

    /// Registers a closure as a listener.
    pub fn subscribe_fn<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(StateChange, &AppState) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Runs `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Clones the current state.
    pub fn snapshot(&self) -> AppState {
        self.read(AppState::clone)
    }

    pub fn credential(&self) -> String {
        self.read(|state| state.credential.clone())
    }

    pub fn history(&self) -> Vec<Turn> {
        self.read(|state| state.history.clone())
    }

    pub fn models(&self) -> Vec<ModelDescriptor> {
        self.read(|state| state.models.clone())
    }

    pub fn has_models(&self) -> bool {
        self.read(|state| !state.models.is_empty())
    }

    pub fn selected_model(&self) -> String {
        self.read(|state| state.selected_model.clone())
    }

    pub fn temperature(&self) -> f64 {
        self.read(|state| state.temperature)
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Applies `f` and notifies listeners with `change`.
    ///
    /// This is the general escape hatch; prefer the typed setters, which skip
    /// the commit when nothing changes.
    pub fn update(&self, change: StateChange, f: impl FnOnce(&mut AppState)) {
        self.commit_if(change, |state| {
            f(state);
            true
        });
    }

    /// Sets the API credential. An empty value falls back to the placeholder.
    ///
    /// Returns `false` (and notifies nobody) when the value is unchanged.
    pub fn set_credential(&self, credential: &str) -> bool {
        let credential = AppState::normalize_credential(credential);
        self.commit_if(StateChange::Credential, |state| {
            if state.credential == credential {
                return false;
            }
            state.credential = credential;
            true
        })
    }

    /// Appends a turn to the conversation.
    pub fn push_turn(&self, turn: Turn) {
        self.update(StateChange::History, |state| state.history.push(turn));
    }

    /// Drops the whole conversation.
    pub fn clear_history(&self) -> bool {
        self.commit_if(StateChange::History, |state| {
            if state.history.is_empty() {
                return false;
            }
            state.history.clear();
            true
        })
    }

    /// Replaces the model catalog in one step.
    pub fn set_models(&self, models: Vec<ModelDescriptor>) -> bool {
        self.commit_if(StateChange::Models, |state| {
            if state.models == models {
                return false;
            }
            state.models = models;
            true
        })
    }

    /// Selects the model used for generation.
    pub fn select_model(&self, name: &str) -> bool {
        self.commit_if(StateChange::SelectedModel, |state| {
            if state.selected_model == name {
                return false;
            }
            if !state.models.is_empty() && state.find_model(name).is_none() {
                tracing::warn!("[Store] Selected model '{}' is not in the catalog", name);
            }
            state.selected_model = name.to_string();
            true
        })
    }

    /// Sets the sampling temperature.
    ///
    /// NaN and infinities are rejected (returns `false`, nothing committed):
    /// they cannot be written to the stored JSON document.
    pub fn set_temperature(&self, temperature: f64) -> bool {
        if !AppState::is_valid_temperature(temperature) {
            tracing::warn!("[Store] Ignoring non-finite temperature {}", temperature);
            return false;
        }
        self.commit_if(StateChange::Temperature, |state| {
            if state.temperature == temperature {
                return false;
            }
            state.temperature = temperature;
            true
        })
    }

    pub fn set_system_instruction(&self, instruction: &str) -> bool {
        self.commit_if(StateChange::SystemInstruction, |state| {
            if state.system_instruction == instruction {
                return false;
            }
            state.system_instruction = instruction.to_string();
            true
        })
    }

    /// Replaces the whole state.
    ///
    /// A non-finite temperature in `new_state` is ignored and the current one
    /// kept.
    pub fn replace(&self, mut new_state: AppState) {
        new_state.credential = AppState::normalize_credential(&new_state.credential);
        self.update(StateChange::Replaced, |state| {
            if !AppState::is_valid_temperature(new_state.temperature) {
                tracing::warn!(
                    "[Store] Ignoring non-finite temperature {} in replacement state",
                    new_state.temperature
                );
                new_state.temperature = state.temperature;
            }
            *state = new_state;
        });
    }

    /// Runs `f` under the write lock and, if it reports a change, notifies
    /// listeners with a snapshot of the committed state.
    fn commit_if(&self, change: StateChange, f: impl FnOnce(&mut AppState) -> bool) -> bool {
        let _commit = self
            .inner
            .commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let snapshot = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !f(&mut state) {
                return false;
            }
            state.clone()
        };

        let listeners: Vec<Arc<dyn StateListener>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        tracing::debug!(
            "[Store] Committed {:?}, notifying {} listener(s)",
            change,
            listeners.len()
        );
        for listener in listeners {
            listener.on_change(change, &snapshot);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::model::FALLBACK_API_KEY;

    fn recording_store() -> (StateStore, Arc<Mutex<Vec<StateChange>>>) {
        let store = StateStore::new(AppState::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe_fn(move |change, _| sink.lock().unwrap().push(change));
        (store, seen)
    }

    #[test]
    fn test_push_turn_notifies_with_committed_state() {
        let store = StateStore::new(AppState::default());
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);
        store.subscribe_fn(move |change, state| {
            assert_eq!(change, StateChange::History);
            sink.lock().unwrap().push(state.history.len());
        });

        store.push_turn(Turn::user("hi"));
        store.push_turn(Turn::model("meow"));

        assert_eq!(*lengths.lock().unwrap(), vec![7, 8]);
        assert_eq!(store.history().last().unwrap().text(), "meow");
    }

    #[test]
    fn test_unchanged_values_do_not_notify() {
        let (store, seen) = recording_store();

        assert!(!store.set_credential(FALLBACK_API_KEY));
        assert!(!store.set_temperature(1.0));
        assert!(!store.select_model("gemini-2.5-flash"));
        assert!(!store.set_models(Vec::new()));

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_set_credential_falls_back_to_placeholder() {
        let (store, seen) = recording_store();

        assert!(store.set_credential("key-a"));
        assert_eq!(store.credential(), "key-a");

        assert!(store.set_credential(""));
        assert_eq!(store.credential(), FALLBACK_API_KEY);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![StateChange::Credential, StateChange::Credential]
        );
    }

    #[test]
    fn test_non_finite_temperature_is_rejected() {
        let (store, seen) = recording_store();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(!store.set_temperature(bad));
            assert!(!store.set_temperature(bad));
        }

        assert_eq!(store.temperature(), 1.0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_replace_keeps_current_temperature_when_non_finite() {
        let store = StateStore::new(AppState::default());
        store.set_temperature(0.4);

        let mut next = store.snapshot();
        next.temperature = f64::NAN;
        next.history.push(Turn::user("kept"));
        store.replace(next);

        assert_eq!(store.temperature(), 0.4);
        assert_eq!(store.history().last(), Some(&Turn::user("kept")));

        let seeded = StateStore::new(AppState {
            temperature: f64::INFINITY,
            ..AppState::default()
        });
        assert_eq!(seeded.temperature(), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_credential_whitespace_is_preserved() {
        let store = StateStore::new(AppState::default());

        assert!(store.set_credential(" key "));
        assert_eq!(store.credential(), " key ");
        assert!(store.set_credential("  "));
        assert_eq!(store.credential(), FALLBACK_API_KEY);
    }

    #[test]
    fn test_new_normalizes_empty_credential() {
        let state = AppState {
            credential: String::new(),
            ..AppState::default()
        };
        let store = StateStore::new(state);
        assert_eq!(store.credential(), FALLBACK_API_KEY);
    }

    #[test]
    fn test_listeners_called_in_subscription_order() {
        let store = StateStore::new(AppState::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let sink = Arc::clone(&order);
            store.subscribe_fn(move |_, _| sink.lock().unwrap().push(tag));
        }

        store.set_temperature(0.3);

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe() {
        let (store, seen) = recording_store();
        let id = store.subscribe_fn(|_, _| panic!("should have been removed"));

        assert_eq!(store.listener_count(), 2);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));

        store.set_temperature(0.7);
        assert_eq!(*seen.lock().unwrap(), vec![StateChange::Temperature]);
    }

    #[test]
    fn test_listener_can_read_store() {
        let store = StateStore::new(AppState::default());
        let reader = store.clone();
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);
        store.subscribe_fn(move |_, _| {
            *sink.lock().unwrap() = Some(reader.temperature());
        });

        store.set_temperature(0.25);

        assert_eq!(*observed.lock().unwrap(), Some(0.25));
    }

    #[test]
    fn test_clones_share_state() {
        let store = StateStore::new(AppState::default());
        let other = store.clone();
        other.select_model("gemini-2.5-pro");
        assert_eq!(store.selected_model(), "gemini-2.5-pro");
    }

    #[test]
    fn test_replace_and_clear_history() {
        let (store, seen) = recording_store();

        assert!(store.clear_history());
        assert!(!store.clear_history());
        assert!(store.history().is_empty());

        store.replace(AppState::default());
        assert_eq!(store.history().len(), 6);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![StateChange::History, StateChange::Replaced]
        );
        assert!(StateChange::Replaced.affects_credential());
        assert!(!StateChange::History.affects_credential());
    }
}
