//! Model catalog domain: raw catalog entries and the filter that turns them
//! into the [`ModelDescriptor`] list kept in the app state.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::ModelDescriptor;

/// Action a model must support to be usable for chat.
pub const GENERATE_CONTENT_ACTION: &str = "generateContent";

/// A catalog entry as returned by the remote provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawModel {
    /// Fully qualified name (e.g. `models/gemini-2.5-flash`).
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, alias = "supportedGenerationMethods")]
    pub supported_actions: Vec<String>,
}

impl RawModel {
    pub fn supports(&self, action: &str) -> bool {
        self.supported_actions.iter().any(|a| a == action)
    }
}

/// Source of raw catalog entries (the remote API, or a fake in tests).
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches the first page of the catalog.
    async fn list_models(&self) -> Result<Vec<RawModel>>;
}

/// Removes the leading namespace segment of a catalog name.
///
/// `models/gemini-2.5-flash` becomes `gemini-2.5-flash`; a name without a
/// namespace is returned unchanged.
pub fn strip_namespace(name: &str) -> &str {
    name.split_once('/').map_or(name, |(_, rest)| rest)
}

/// Keeps the models that support content generation, sorted by display name
/// ascending, with namespaces stripped and duplicate identifiers dropped.
pub fn build_catalog(raw: Vec<RawModel>) -> Vec<ModelDescriptor> {
    let mut models: Vec<ModelDescriptor> = raw
        .into_iter()
        .filter(|model| model.supports(GENERATE_CONTENT_ACTION))
        .map(|model| {
            let name = strip_namespace(&model.name).to_string();
            ModelDescriptor {
                display_name: model.display_name.unwrap_or_else(|| name.clone()),
                name,
                supported_actions: model.supported_actions,
            }
        })
        .collect();

    models.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut seen = HashSet::new();
    models.retain(|model| seen.insert(model.name.clone()));
    models
}
