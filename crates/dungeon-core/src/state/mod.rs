//! Application state domain module.
//!
//! # Module Structure
//!
//! - `model`: the persisted document (`AppState`, `Turn`, `ModelDescriptor`)
//! - `repository`: persistence adapter trait
//! - `store`: the observable in-memory container

pub mod model;
pub mod repository;
pub mod store;

// Re-export public API
pub use model::{
    AppState, DEFAULT_MODEL, DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_TEMPERATURE, FALLBACK_API_KEY,
    ModelDescriptor, Part, Role, Turn, seeded_history,
};
pub use repository::{LoadedState, StateOrigin, StateRepository};
pub use store::{StateChange, StateListener, StateStore, SubscriptionId};
