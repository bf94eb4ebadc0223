//! Configuration management
//!
//! Settings come from the environment (a `.env` file is honoured) over the
//! defaults below. Command-line flags are applied on top by the binary.

use crate::context::ItemContext;
use crate::error::{DumpError, Result};
use crate::registry::{KeyScheme, Registry, RegistryConfig, DEFAULT_SEQUENCE_START};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Defaults
// ============================================================================

/// Namespace of the coarse (target) vocabulary
pub const DEFAULT_INTERNAL_PREFIX: &str = "MESH";

/// Namespace of the externally mapped ids
pub const DEFAULT_EXTERNAL_PREFIX: &str = "OMIM";

/// Directory item files are written to
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// Reference checking is on unless switched off explicitly
pub const DEFAULT_CHECK_REFS: bool = true;

/// Complete tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub namespaces: Namespaces,
    pub registry: RegistryConfig,
    pub output: OutputConfig,
}

/// Id prefixes of the two vocabularies being reconciled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespaces {
    /// e.g. `MESH`
    pub internal: String,
    /// e.g. `OMIM`
    pub external: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Namespaces {
    pub fn new(internal: impl Into<String>, external: impl Into<String>) -> Self {
        Self {
            internal: internal.into(),
            external: external.into(),
        }
    }

    pub fn is_internal(&self, id: &str) -> bool {
        has_prefix(id, &self.internal)
    }

    pub fn is_external(&self, id: &str) -> bool {
        has_prefix(id, &self.external)
    }

    /// `D000001` -> `MESH:D000001`; already prefixed ids are returned as-is
    pub fn qualify_internal(&self, raw: &str) -> String {
        qualify(&self.internal, raw)
    }

    /// `100100` -> `OMIM:100100`; already prefixed ids are returned as-is
    pub fn qualify_external(&self, raw: &str) -> String {
        qualify(&self.external, raw)
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new(DEFAULT_INTERNAL_PREFIX, DEFAULT_EXTERNAL_PREFIX)
    }
}

/// True when `id` is `<prefix>:<something>`
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// Prefix a bare accession with `<prefix>:`
pub fn qualify(prefix: &str, raw: &str) -> String {
    let raw = raw.trim();
    if has_prefix(raw, prefix) {
        raw.to_string()
    } else {
        format!("{}:{}", prefix, raw)
    }
}

/// Part of an id after its first `:`; the id itself when it has no prefix
pub fn strip_prefix(id: &str) -> &str {
    id.split_once(':').map_or(id, |(_, rest)| rest)
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults.
    /// Not validated; callers apply their overrides and then [`Config::validate`].
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read the environment over the defaults
    ///
    /// - `MGI_DUMP_INTERNAL_PREFIX`, `MGI_DUMP_EXTERNAL_PREFIX`
    /// - `MGI_DUMP_CHECK_REFS`: true/false
    /// - `MGI_DUMP_KEY_SCHEME`: sequenced/natural
    /// - `MGI_DUMP_SEQUENCE_START`
    /// - `MGI_DUMP_OUTPUT_DIR`
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(prefix) = std::env::var("MGI_DUMP_INTERNAL_PREFIX") {
            config.namespaces.internal = prefix;
        }
        if let Ok(prefix) = std::env::var("MGI_DUMP_EXTERNAL_PREFIX") {
            config.namespaces.external = prefix;
        }
        if let Ok(value) = std::env::var("MGI_DUMP_CHECK_REFS") {
            config.registry.strict = parse_bool(&value).ok_or_else(|| {
                DumpError::config(format!("MGI_DUMP_CHECK_REFS must be true or false, got '{}'", value))
            })?;
        }
        if let Ok(value) = std::env::var("MGI_DUMP_KEY_SCHEME") {
            config.registry.scheme = value.parse::<KeyScheme>().map_err(DumpError::Config)?;
        }
        if let Ok(value) = std::env::var("MGI_DUMP_SEQUENCE_START") {
            config.registry.sequence_start = value.trim().parse().map_err(|e| {
                DumpError::config(format!("MGI_DUMP_SEQUENCE_START '{}': {}", value, e))
            })?;
        }
        if let Ok(dir) = std::env::var("MGI_DUMP_OUTPUT_DIR") {
            config.output.dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Fresh registry and item output context for one run
    pub fn item_context(&self) -> ItemContext {
        ItemContext::new(Registry::new(self.registry), &self.output.dir)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (label, prefix) in [
            ("internal", &self.namespaces.internal),
            ("external", &self.namespaces.external),
        ] {
            if prefix.is_empty() {
                return Err(DumpError::config(format!("{} namespace prefix cannot be empty", label)));
            }
            if prefix.contains(':') || prefix.contains(char::is_whitespace) {
                return Err(DumpError::config(format!(
                    "{} namespace prefix '{}' must not contain ':' or whitespace",
                    label, prefix
                )));
            }
        }

        if self.namespaces.internal == self.namespaces.external {
            return Err(DumpError::config(format!(
                "internal and external namespaces must differ (both '{}')",
                self.namespaces.internal
            )));
        }

        if self.registry.sequence_start == 0 {
            return Err(DumpError::config("sequence start must be greater than 0"));
        }

        if !self.registry.strict {
            tracing::warn!("Reference checking is disabled - dangling references will not be detected");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespaces: Namespaces::default(),
            registry: RegistryConfig {
                strict: DEFAULT_CHECK_REFS,
                scheme: KeyScheme::Sequenced,
                sequence_start: DEFAULT_SEQUENCE_START,
            },
            output: OutputConfig {
                dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            },
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
