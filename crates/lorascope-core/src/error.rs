//! Error types for the lorascope core.
//!
//! Parsing paths deliberately do not appear here: malformed radio
//! input is routine and is handled by `Option` returns (treated as
//! "discard the packet"), never by errors. The variants below cover
//! configuration loading and pipeline plumbing.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Operator prefix entry could not be parsed
    #[error("invalid operator prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
