//! `mgi-dump emapa` command implementation

use crate::commands::{write_obo, write_report};
use crate::error::Result;
use crate::reconcile::anatomy::{normalize_emapa, EmapaReport};
use crate::OutputArgs;
use mgi_common::obo;
use std::path::Path;

pub fn run(input: &Path, output: &OutputArgs) -> Result<EmapaReport> {
    let (stanzas, report) = normalize_emapa(obo::read_file(input)?);

    write_obo(output.output.as_deref(), &stanzas)?;
    write_report(output.report.as_deref(), "emapa", &report)?;
    Ok(report)
}
