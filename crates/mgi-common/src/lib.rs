//! MGI Common Library
//!
//! Shared pieces used by every MGI dump tool.
//!
//! - **Error Handling**: [`MgiError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup for batch runs ([`logging`])
//! - **OBO**: streaming reader and reproducible writer for ontology stanzas ([`obo`])
//!
//! # Example
//!
//! ```no_run
//! use mgi_common::obo;
//!
//! fn count_terms(path: &str) -> mgi_common::Result<usize> {
//!     let stanzas = obo::read_file(path)?;
//!     Ok(stanzas.iter().filter(|s| s.is_term()).count())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod obo;

// Re-export commonly used types
pub use error::{MgiError, Result};
