//! `mgi-dump medic` command implementation

use crate::commands::{write_obo, write_report};
use crate::config::Config;
use crate::error::Result;
use crate::names::NameTable;
use crate::reconcile::medic::{conflate, MedicReport};
use crate::OutputArgs;
use mgi_common::obo;
use std::path::Path;

/// Conflate `input` with the authoritative names in `names`
pub fn run(input: &Path, names: &Path, output: &OutputArgs, config: &Config) -> Result<MedicReport> {
    let stanzas = obo::read_file(input)?;
    let names = NameTable::from_file(names, &config.namespaces.external)?;

    let (stanzas, report) = conflate(stanzas, &names, &config.namespaces);

    write_obo(output.output.as_deref(), &stanzas)?;
    write_report(output.report.as_deref(), "medic", &report)?;
    Ok(report)
}
