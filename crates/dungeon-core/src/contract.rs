//! Response contract for model replies.
//!
//! Every generation request asks the model for JSON of the shape
//! `{ "response": string, "options": [string; 5] }` with no other fields.
//! [`RoleplayReply::parse`] checks that the reply actually honours it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{DungeonError, Result};

/// MIME type requested for model output.
pub const RESPONSE_MIME_TYPE: &str = "application/json";

/// Number of suggested next actions every reply carries.
pub const OPTION_COUNT: usize = 5;

/// JSON schema attached to every generation request.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "response": {
                "type": "string",
                "description": "Neko's main in-character response as a cat."
            },
            "options": {
                "type": "array",
                "description": "Five possible next actions the user might take in the role-playing scenario.",
                "items": { "type": "string" },
                "minItems": OPTION_COUNT,
                "maxItems": OPTION_COUNT
            }
        },
        "required": ["response", "options"],
        "additionalProperties": false
    })
}

/// A model reply that satisfies the response contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleplayReply {
    /// The in-character reply.
    pub response: String,
    /// Exactly [`OPTION_COUNT`] suggested next actions.
    pub options: Vec<String>,
}

impl RoleplayReply {
    /// Parses and validates raw model output.
    ///
    /// A surrounding Markdown code fence is tolerated; anything else that is
    /// not exactly the contract shape is a [`DungeonError::Contract`].
    pub fn parse(raw: &str) -> Result<Self> {
        let body = strip_code_fence(raw);
        let reply: RoleplayReply = serde_json::from_str(body)
            .map_err(|e| DungeonError::contract(format!("reply is not contract JSON: {e}")))?;
        reply.validate()?;
        Ok(reply)
    }

    /// Checks the option count.
    pub fn validate(&self) -> Result<()> {
        if self.options.len() != OPTION_COUNT {
            return Err(DungeonError::contract(format!(
                "expected {} options, got {}",
                OPTION_COUNT,
                self.options.len()
            )));
        }
        Ok(())
    }

    /// The option at `index`, if present.
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
