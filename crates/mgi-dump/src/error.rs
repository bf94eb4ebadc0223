//! Error types for the dump tools
//!
//! [`RegistryError`] stays a separate, two-variant type so that per-record
//! callers can match on it directly; everything above the registry folds into
//! [`DumpError`].

use crate::registry::RegistryError;
use mgi_common::MgiError;
use thiserror::Error;

/// Result type alias for dump operations
pub type Result<T> = std::result::Result<T, DumpError>;

/// Error type for everything above the registry
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read tab-delimited input: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Common(#[from] MgiError),

    #[error("Parse error in {file} line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid XML escape: {0}")]
    Xml(#[from] quick_xml::escape::EscapeError),
}

impl DumpError {
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
