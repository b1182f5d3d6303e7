//! Content generation request and the generator seam.

use async_trait::async_trait;
use serde_json::Value;

use crate::contract::{RESPONSE_MIME_TYPE, response_schema};
use crate::error::Result;
use crate::state::{AppState, Turn};

/// Everything one generation call needs, taken from a state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub temperature: f64,
    pub system_instruction: String,
    pub history: Vec<Turn>,
    pub response_mime_type: String,
    pub response_schema: Value,
}

impl GenerationRequest {
    /// Builds a contract-bound request from the current settings and history.
    pub fn from_state(state: &AppState) -> Self {
        Self {
            model: state.selected_model.clone(),
            temperature: state.temperature,
            system_instruction: state.system_instruction.clone(),
            history: state.history.clone(),
            response_mime_type: RESPONSE_MIME_TYPE.to_string(),
            response_schema: response_schema(),
        }
    }
}

/// Something that can turn a [`GenerationRequest`] into raw model text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
