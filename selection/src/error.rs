//! Error handling for the stone lot selector
//!
//! None of these errors escape a [`crate::services::SelectionSession`]: fetch
//! failures become an error state on the list and failed commits revert the
//! toggle. They surface as values to the caller of the lower-level pieces.

use thiserror::Error;

/// Selection error types
#[derive(Error, Debug)]
pub enum SelectionError {
    // Remote query errors
    #[error("Inventory query failed: {0}")]
    Query(String),

    #[error("Remote method not implemented: {0}")]
    NotImplemented(String),

    #[error("Remote call failed ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Malformed record: {0}")]
    Record(#[from] shared::ParseError),

    // Host record errors
    #[error("Host record update failed: {0}")]
    Host(String),

    #[error("Cannot build command: {0}")]
    CommandBuild(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Authentication failed for {0}")]
    Authentication(String),
}

impl SelectionError {
    /// Message shown next to the candidate list; keeps the transport's own text
    pub fn user_message(&self) -> String {
        match self {
            SelectionError::Query(msg) | SelectionError::Host(msg) => msg.clone(),
            SelectionError::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, SelectionError::NotImplemented(_))
    }
}

/// Result type alias for selection operations
pub type SelectionResult<T> = Result<T, SelectionError>;
