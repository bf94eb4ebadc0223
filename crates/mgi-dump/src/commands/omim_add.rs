//! `mgi-dump omim-add` command implementation

use crate::commands::{write_obo, write_report};
use crate::config::Config;
use crate::error::Result;
use crate::names::NameTable;
use crate::reconcile::medic::add_missing_terms;
use crate::OutputArgs;
use mgi_common::obo;
use std::path::Path;

/// Append root terms for authoritative ids missing from `input`. Returns the
/// added ids.
pub fn run(input: &Path, names: &Path, output: &OutputArgs, config: &Config) -> Result<Vec<String>> {
    let mut stanzas = obo::read_file(input)?;
    let names = NameTable::from_file(names, &config.namespaces.external)?;

    let added = add_missing_terms(&mut stanzas, &names, &config.namespaces);

    write_obo(output.output.as_deref(), &stanzas)?;
    write_report(output.report.as_deref(), "omim-add", &added)?;
    Ok(added)
}
