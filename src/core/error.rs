//! Error types for FlowLens

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using FlowLens's Error
pub type Result<T> = std::result::Result<T, Error>;

/// FlowLens error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    #[error("No index found at {}. Run `flowlens index` first.", path.display())]
    IndexMissing { path: PathBuf },

    #[error("Loader error: {message}")]
    Loader { message: String },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Analysis error: {message}")]
    Analysis { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a NotFound error naming the missing entity.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Shorthand for an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    /// Shorthand for an Analysis error.
    pub fn analysis(message: impl Into<String>) -> Self {
        Error::Analysis {
            message: message.into(),
        }
    }
}
