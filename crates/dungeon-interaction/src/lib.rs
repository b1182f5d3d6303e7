//! Remote side of the dungeon client: the Gemini REST client, the
//! credential-keyed client handle and the lazy model catalog loader.

pub mod catalog_loader;
pub mod client_handle;
pub mod gemini_api_client;

pub use catalog_loader::{CatalogOutcome, ModelCatalogLoader};
pub use client_handle::{ClientFactory, ClientHandle, GeminiClientFactory};
pub use gemini_api_client::GeminiApiClient;
