//! Error types shared by the MGI dump tools

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, MgiError>;

/// Main error type for the shared layer
#[derive(Error, Debug)]
pub enum MgiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MgiError {
    /// Create a parse error anchored to a 1-based input line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
