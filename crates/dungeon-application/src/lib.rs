//! Application layer for dungeon.
//!
//! This crate wires the domain and infrastructure layers into a running
//! [`ChatSession`] and owns process-level setup such as logging.

pub mod chat_session;
pub mod logging;

pub use chat_session::{ChatSession, RemoteClient};
pub use logging::init_logging;
