//! Error types for the Dungeon client core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for every Dungeon crate.
///
/// Variants are typed and structured so that the UI layer can decide how to
/// surface a failure, with automatic conversion from common error types via
/// the `From` trait.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum DungeonError {
    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Storage backend error (key-value store, flush worker)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote API error (transport failure or non-success HTTP status)
    #[error("API error{}: {message}", status_suffix(.status_code))]
    Api {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
    },

    /// The model reply does not honour the response contract
    #[error("Response contract violation: {0}")]
    Contract(String),

    /// Invalid caller input (e.g. an option index out of range)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DungeonError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Api error
    pub fn api(status_code: Option<u16>, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
            is_retryable,
        }
    }

    /// Creates a Contract error
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    /// Creates an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Check if this is a remote API error
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Check if this is a response contract violation
    pub fn is_contract(&self) -> bool {
        matches!(self, Self::Contract(_))
    }

    /// Check if this is invalid caller input
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only remote API errors carry this hint; nothing in the core retries on
    /// its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api {
                is_retryable: true,
                ..
            }
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for DungeonError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for DungeonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DungeonError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" ({code})"))
        .unwrap_or_default()
}

/// A type alias for `Result<T, DungeonError>`.
pub type Result<T> = std::result::Result<T, DungeonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_includes_status() {
        let err = DungeonError::api(Some(403), "PERMISSION_DENIED: bad key", false);
        assert_eq!(err.to_string(), "API error (403): PERMISSION_DENIED: bad key");

        let err = DungeonError::api(None, "connection refused", true);
        assert_eq!(err.to_string(), "API error: connection refused");
    }

    #[test]
    fn test_retryable_only_for_api_errors() {
        assert!(DungeonError::api(Some(503), "unavailable", true).is_retryable());
        assert!(!DungeonError::api(Some(400), "bad request", false).is_retryable());
        assert!(!DungeonError::storage("disk full").is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: DungeonError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.is_serialization());
        match err {
            DungeonError::Serialization { format, .. } => assert_eq!(format, "JSON"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DungeonError = io.into();
        assert!(err.is_io());
        assert!(err.to_string().contains("NotFound"));
    }
}
