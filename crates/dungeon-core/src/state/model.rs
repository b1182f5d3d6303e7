//! Application state domain models.
//!
//! Contains the conversation, model catalog and generation settings that
//! persist across sessions as a single JSON document.

use serde::{Deserialize, Deserializer, Serialize};

/// Credential used when no API key has ever been persisted.
pub const FALLBACK_API_KEY: &str = "FALLBACK_API_KEY";

/// Model selected when no selection has ever been persisted.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Sampling temperature used when nothing has been persisted.
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Persona prompt sent as the system instruction of every request.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"
You are a helpful AI named Neko. You always roleplay as a friendly, playful cat.
Always respond ONLY with strict JSON containing:
- "response": Neko's main in-character reply as a string
- "options": an array of exactly 5 strings with possible player actions

Example Output:

{
  "response": "Neko flicks her tail playfully and looks at you with big curious eyes.",
  "options": [
    "Offer Neko a small piece of fish.",
    "Ask Neko if she knows the way to the hidden garden.",
    "Follow Neko as she trots toward the old oak tree.",
    "Pet Neko gently and listen to her purring.",
    "Challenge Neko to a playful race down the path."
  ]
}
"#;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the player.
    User,
    /// Message produced by the remote model.
    Model,
}

/// A single text fragment of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One message in the conversation.
///
/// The wire shape (`{ role, parts: [{ text }] }`) is shared by the persisted
/// document and the generation request, so history can be sent as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// Creates a single-part turn.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    /// Creates a single-part user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Creates a single-part model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    /// Concatenated text of all parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A model from the remote catalog that supports content generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Catalog name with the `models/` namespace stripped (e.g. `gemini-2.5-flash`).
    pub name: String,
    /// Human readable name shown in the model picker.
    pub display_name: String,
    /// Methods the model supports (e.g. `generateContent`, `countTokens`).
    #[serde(default)]
    pub supported_actions: Vec<String>,
}

/// Application state that persists across restarts.
///
/// Field names on disk follow the camelCase layout of the stored document
/// (`apiKey`, `history`, `models`, `selectedModel`, `temperature`,
/// `systemInstruction`). A missing field takes its default value, so one
/// absent key never discards the rest of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    /// API access token. Never empty; see [`AppState::normalize_credential`].
    #[serde(rename = "apiKey")]
    pub credential: String,

    /// Conversation in chronological order.
    pub history: Vec<Turn>,

    /// Catalog of usable models, empty until the catalog loader succeeds.
    pub models: Vec<ModelDescriptor>,

    /// Identifier of the model used for generation.
    pub selected_model: String,

    /// Sampling temperature. Bounds are left to the UI, but it is always
    /// finite: JSON has no encoding for NaN or infinity.
    #[serde(deserialize_with = "deserialize_temperature")]
    pub temperature: f64,

    /// Persona prompt prefix.
    pub system_instruction: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            credential: FALLBACK_API_KEY.to_string(),
            history: seeded_history(),
            models: Vec::new(),
            selected_model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl AppState {
    /// Creates the built-in default state with the seeded welcome conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps an empty or blank credential to [`FALLBACK_API_KEY`]; any other
    /// value is kept exactly as given.
    pub fn normalize_credential(credential: &str) -> String {
        if credential.trim().is_empty() {
            FALLBACK_API_KEY.to_string()
        } else {
            credential.to_string()
        }
    }

    /// Whether `temperature` can be stored and sent.
    pub fn is_valid_temperature(temperature: f64) -> bool {
        temperature.is_finite()
    }

    /// Whether the credential is still the placeholder.
    pub fn has_placeholder_credential(&self) -> bool {
        self.credential == FALLBACK_API_KEY
    }

    /// The most recent model turn, if any.
    pub fn last_model_turn(&self) -> Option<&Turn> {
        self.history.iter().rev().find(|turn| turn.role == Role::Model)
    }

    /// Looks up a catalog entry by identifier.
    pub fn find_model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|model| model.name == name)
    }
}

/// Reads a stored temperature, falling back to the default for `null`
/// (how non-finite numbers end up on disk).
fn deserialize_temperature<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|t| AppState::is_valid_temperature(*t))
        .unwrap_or(DEFAULT_TEMPERATURE))
}

/// The welcome conversation every fresh session starts with.
pub fn seeded_history() -> Vec<Turn> {
    vec![
        Turn::user("Hello"),
        Turn::model("Meow! I am Neko. Ask me anything."),
        Turn::user("How are you?"),
        Turn::model("Purr... I am doing great! How can I assist you today?"),
        Turn::user("What is the meaning of life?"),
        Turn::model(
            "Meow! The meaning of life is to find joy, love, and purpose in the little things. Like chasing laser pointers and napping in sunny spots!",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let state = AppState::default();
        assert_eq!(state.credential, FALLBACK_API_KEY);
        assert_eq!(state.history.len(), 6);
        assert!(state.models.is_empty());
        assert_eq!(state.selected_model, DEFAULT_MODEL);
        assert_eq!(state.temperature, 1.0);
        assert!(state.system_instruction.contains("Neko"));
    }

    #[test]
    fn test_seeded_history_alternates_roles() {
        let history = seeded_history();
        for (index, turn) in history.iter().enumerate() {
            let expected = if index % 2 == 0 { Role::User } else { Role::Model };
            assert_eq!(turn.role, expected);
        }
        assert_eq!(history[0].text(), "Hello");
    }

    #[test]
    fn test_serializes_with_stored_field_names() {
        let value = serde_json::to_value(AppState::default()).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "apiKey",
            "history",
            "models",
            "selectedModel",
            "temperature",
            "systemInstruction",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert_eq!(value["history"][1]["role"], "model");
        assert_eq!(value["history"][1]["parts"][0]["text"], "Meow! I am Neko. Ask me anything.");
    }

    #[test]
    fn test_model_descriptor_uses_camel_case() {
        let descriptor = ModelDescriptor {
            name: "gemini-2.5-pro".to_string(),
            display_name: "Gemini 2.5 Pro".to_string(),
            supported_actions: vec!["generateContent".to_string()],
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["displayName"], "Gemini 2.5 Pro");
        assert_eq!(value["supportedActions"][0], "generateContent");
    }

    #[test]
    fn test_normalize_credential() {
        assert_eq!(AppState::normalize_credential(""), FALLBACK_API_KEY);
        assert_eq!(AppState::normalize_credential("   "), FALLBACK_API_KEY);
        assert_eq!(AppState::normalize_credential(" abc "), " abc ");
        assert_eq!(AppState::normalize_credential("abc"), "abc");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let state: AppState =
            serde_json::from_str(r#"{"apiKey":"k","history":[{"role":"user","parts":[{"text":"kept"}]}]}"#)
                .unwrap();

        assert_eq!(state.credential, "k");
        assert_eq!(state.history, vec![Turn::user("kept")]);
        assert_eq!(state.selected_model, DEFAULT_MODEL);
        assert_eq!(state.temperature, DEFAULT_TEMPERATURE);
        assert!(state.system_instruction.contains("Neko"));
    }

    #[test]
    fn test_null_temperature_falls_back_to_default() {
        let state: AppState =
            serde_json::from_str(r#"{"apiKey":"k","history":[],"temperature":null}"#).unwrap();

        assert_eq!(state.temperature, DEFAULT_TEMPERATURE);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_valid_temperature() {
        assert!(AppState::is_valid_temperature(0.0));
        assert!(AppState::is_valid_temperature(2.5));
        assert!(!AppState::is_valid_temperature(f64::NAN));
        assert!(!AppState::is_valid_temperature(f64::INFINITY));
        assert!(!AppState::is_valid_temperature(f64::NEG_INFINITY));
    }

    #[test]
    fn test_last_model_turn() {
        let mut state = AppState::default();
        state.history.push(Turn::user("hi"));
        let last = state.last_model_turn().unwrap();
        assert!(last.text().starts_with("Meow! The meaning of life"));

        state.history.clear();
        assert!(state.last_model_turn().is_none());
    }
}
