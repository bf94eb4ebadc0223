//! `mgi-dump filter-do` command implementation

use crate::commands::{write_obo, write_report};
use crate::config::Config;
use crate::error::Result;
use crate::reconcile::disease::{filter_disease_ontology, DiseaseFilterReport};
use crate::OutputArgs;
use mgi_common::obo;
use std::path::Path;

pub fn run(input: &Path, output: &OutputArgs, config: &Config) -> Result<DiseaseFilterReport> {
    let stanzas = obo::read_file(input)?;
    let (stanzas, report) = filter_disease_ontology(stanzas, &config.namespaces);

    write_obo(output.output.as_deref(), &stanzas)?;
    write_report(output.report.as_deref(), "filter-do", &report)?;
    Ok(report)
}
