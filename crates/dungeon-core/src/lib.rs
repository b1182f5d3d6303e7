//! Domain core of the Dungeon role-play chat client.
//!
//! - [`state`]: the persisted app state, its repository trait and the
//!   observable container every other component shares.
//! - [`catalog`]: filtering of the remote model catalog.
//! - [`contract`]: the JSON response contract and reply validation.
//! - [`generation`]: the generation request and the generator seam.
//! - [`config`]: runtime configuration.

pub mod catalog;
pub mod config;
pub mod contract;
pub mod error;
pub mod generation;
pub mod state;

// Re-export common error type
pub use error::{DungeonError, Result};
