//! Error types for the tree and its command adapter.

use thiserror::Error;

/// Result type alias for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur while building or querying the tree
#[derive(Error, Debug)]
pub enum TreeError {
    /// The tree was used before `initialize` fixed its order
    #[error("Tree used before initialize")]
    Uninitialized,

    /// Order too small to split a node into two non-empty halves
    #[error("Invalid order {order}: must be at least {min}")]
    InvalidOrder { order: usize, min: usize },

    /// Key has no place in the ordering (NaN)
    #[error("Invalid key: {0}")]
    InvalidKey(f64),

    /// A script line could not be parsed
    #[error("Line {line}: {reason}")]
    InvalidCommand { line: usize, reason: String },

    /// The script ended before its order header
    #[error("Script is missing the order header line")]
    MissingOrder,

    /// A structural invariant does not hold
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// I/O error while reading a script or writing results
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or export (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TreeError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid command error for a 1-based script line
    pub fn invalid_command(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            line,
            reason: reason.into(),
        }
    }
}
