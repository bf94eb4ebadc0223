//! `mgi-dump remosh` command implementation
//!
//! Rewrites the external terms of a base ontology from a cross-mapping table.

use crate::commands::{write_obo, write_report};
use crate::config::Config;
use crate::crossmap::MappingTable;
use crate::error::Result;
use crate::names::{NameTable, TermColumn};
use crate::reconcile::remosh::{remosh, RemoshReport};
use crate::OutputArgs;
use mgi_common::obo;
use std::path::Path;
use tracing::info;

pub fn run(base: &Path, mapping: &Path, names: &Path, output: &OutputArgs, config: &Config) -> Result<RemoshReport> {
    let namespaces = &config.namespaces;
    info!(base = %base.display(), mapping = %mapping.display(), "Remapping external terms");

    let stanzas = obo::read_file(base)?;
    let table = MappingTable::from_file(mapping, namespaces)?;
    // remapped terms carry the export's full term as their name
    let names = NameTable::from_file_as(names, &namespaces.external, TermColumn::Full)?;

    let (stanzas, report) = remosh(stanzas, &table.rows, &names, namespaces);

    write_obo(output.output.as_deref(), &stanzas)?;
    write_report(output.report.as_deref(), "remosh", &report)?;
    Ok(report)
}
