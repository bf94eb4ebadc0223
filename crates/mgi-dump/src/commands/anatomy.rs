//! `mgi-dump anatomy` command implementation
//!
//! Merges the EMAP and MA vocabularies and places every GXD structure in the
//! merged tree.

use crate::commands::{write_obo, write_report};
use crate::error::Result;
use crate::reconcile::anatomy::{
    parse_id_table, read_id_table, read_structures_file, AnatomyMerger, AnatomyReport, DEFAULT_CONCEPTUS,
    DEFAULT_OVERRIDES,
};
use crate::OutputArgs;
use mgi_common::obo;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Input files of an anatomy merge
#[derive(Debug, Clone, Copy)]
pub struct AnatomyInputs<'a> {
    pub emap: &'a Path,
    pub ma: &'a Path,
    pub gxd: &'a Path,
    pub overrides: Option<&'a Path>,
    pub conceptus: Option<&'a Path>,
}

pub fn run(inputs: AnatomyInputs<'_>, output: &OutputArgs) -> Result<AnatomyReport> {
    let emap = obo::read_file(inputs.emap)?;
    let ma = obo::read_file(inputs.ma)?;
    let structures = read_structures_file(inputs.gxd)?;

    let overrides = load_table(inputs.overrides, DEFAULT_OVERRIDES)?;
    let conceptus = load_table(inputs.conceptus, DEFAULT_CONCEPTUS)?;
    let merger = AnatomyMerger::new(overrides, conceptus);

    let (stanzas, report) = merger.merge(emap, ma, &structures);

    write_obo(output.output.as_deref(), &stanzas)?;
    write_report(output.report.as_deref(), "anatomy", &report)?;
    Ok(report)
}

fn load_table(path: Option<&Path>, builtin: &str) -> Result<BTreeMap<String, String>> {
    match path {
        Some(path) => read_id_table(path),
        None => {
            debug!("Using built-in id table");
            parse_id_table(builtin.as_bytes())
        },
    }
}
