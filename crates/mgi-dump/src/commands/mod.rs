//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. Commands read
//! their inputs, call into the library and write the results; they return the
//! run report so callers (and tests) can inspect it.

pub mod anatomy;
pub mod check_ids;
pub mod emapa;
pub mod filter_do;
pub mod medic;
pub mod omim_add;
pub mod remosh;

use crate::error::Result;
use chrono::{DateTime, Utc};
use mgi_common::obo::{self, Stanza};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// JSON report as written to `--report`
#[derive(Debug, Serialize)]
pub struct ReportEnvelope<'a, T> {
    pub command: &'a str,
    pub generated_at: DateTime<Utc>,
    pub report: &'a T,
}

/// Write stanzas to `path`, or to stdout when no path is given. Identity
/// problems in the output are logged, not fatal.
pub fn write_obo(path: Option<&Path>, stanzas: &[Stanza]) -> Result<()> {
    let consistency = obo::check_consistency(stanzas);
    if !consistency.is_clean() {
        warn!(
            duplicate_ids = ?consistency.duplicate_ids,
            shared_alt_ids = ?consistency.shared_alt_ids,
            dangling_parents = ?consistency.dangling_parents,
            "Output ontology has identity problems"
        );
    }

    match path {
        Some(path) => {
            obo::write_file(path, stanzas)?;
            info!(path = %path.display(), stanzas = stanzas.len(), "Wrote ontology");
        },
        None => {
            let mut out = BufWriter::new(io::stdout().lock());
            obo::write_stanzas(&mut out, stanzas)?;
            out.flush()?;
        },
    }
    Ok(())
}

/// Write `report` as pretty JSON if a report path was requested
pub fn write_report<T: Serialize>(path: Option<&Path>, command: &str, report: &T) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let envelope = ReportEnvelope {
        command,
        generated_at: Utc::now(),
        report,
    };
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &envelope)?;
    writeln!(writer)?;
    writer.flush()?;
    info!(path = %path.display(), "Wrote report");
    Ok(())
}
