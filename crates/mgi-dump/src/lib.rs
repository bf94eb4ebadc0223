//! MGI Dump Library
//!
//! Identifier bookkeeping and ontology reconciliation for the MGI data export.
//!
//! # Overview
//!
//! - **Registry** ([`registry`]): assigns stable `<type>_<seq>` item ids,
//!   enforces uniqueness and referential integrity, resolves aliases
//! - **Item output** ([`context`], [`item`], [`dumper`]): renders items to
//!   XML files and drives per-record dump components
//! - **Reconcilers** ([`reconcile`]): rewrite OBO vocabularies against
//!   cross-mapping tables and authoritative names
//! - **Id checking** ([`id_check`]): audits written item files for duplicate
//!   and dangling ids
//!
//! # Example
//!
//! ```
//! use mgi_dump::registry::{Registry, RegistryConfig, TypeKey};
//!
//! let mut registry = Registry::new(RegistryConfig::default());
//! let id = registry.define_id(TypeKey::MARKER, Some(77))?;
//! assert_eq!(id.to_string(), "2_1001");
//! registry.record_written(id)?;
//! assert_eq!(registry.reference_id(TypeKey::MARKER, 77)?, id);
//! # Ok::<(), mgi_dump::registry::RegistryError>(())
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod config;
pub mod context;
pub mod crossmap;
pub mod dumper;
pub mod error;
pub mod id_check;
pub mod item;
pub mod names;
pub mod reconcile;
pub mod registry;

// Re-export commonly used types
pub use config::{Config, Namespaces};
pub use error::{DumpError, Result};
pub use registry::{ItemId, Registry, RegistryConfig, RegistryError, TypeKey};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// MGI Dump - item id registry and ontology reconciliation tools
#[derive(Parser, Debug)]
#[command(name = "mgi-dump")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Prefix of the target (internal) vocabulary
    #[arg(long, env = "MGI_DUMP_INTERNAL_PREFIX", global = true)]
    pub internal_prefix: Option<String>,

    /// Prefix of the external vocabulary
    #[arg(long, env = "MGI_DUMP_EXTERNAL_PREFIX", global = true)]
    pub external_prefix: Option<String>,
}

/// Where a command writes its results
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output OBO file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-apply merge/leaf decisions from a cross-mapping table
    Remosh {
        /// Base ontology (OBO)
        base: PathBuf,

        /// Cross-mapping table (tab-delimited)
        mapping: PathBuf,

        /// Authoritative external names (accid, term, synonyms)
        #[arg(short, long)]
        names: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Conflate a disease vocabulary with the authoritative external names
    Medic {
        /// Disease ontology (OBO)
        input: PathBuf,

        /// Authoritative external names (accid, term, synonyms)
        #[arg(short, long)]
        names: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Add a root term for every authoritative external id missing from a file
    OmimAdd {
        /// Ontology (OBO)
        input: PathBuf,

        /// Authoritative external names (accid, term, synonyms)
        #[arg(short, long)]
        names: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Keep only live DOID terms of a disease ontology
    FilterDo {
        /// Disease ontology (OBO)
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Merge EMAP and MA and place the GXD anatomical structures
    Anatomy {
        /// Staged anatomy vocabulary (EMAP, OBO)
        #[arg(long)]
        emap: PathBuf,

        /// Adult anatomy vocabulary (MA, OBO)
        #[arg(long)]
        ma: PathBuf,

        /// GXD structures (tab-delimited with header)
        #[arg(long)]
        gxd: PathBuf,

        /// MGI to EMAP override table (defaults to the built-in table)
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Conceptus parent table (defaults to the built-in table)
        #[arg(long)]
        conceptus: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Normalise an abstract anatomy (EMAPA) file
    Emapa {
        /// EMAPA ontology (OBO)
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Check item XML files for duplicate and dangling ids
    CheckIds {
        /// Item files or directories of item files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Write the findings as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
}
