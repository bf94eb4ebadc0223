//! `mgi-dump check-ids` command implementation

use crate::commands::write_report;
use crate::error::Result;
use crate::id_check::{IdCheckReport, IdChecker};
use std::path::{Path, PathBuf};

/// Scan item files and print every finding. The caller decides the exit code
/// from [`IdCheckReport::is_clean`].
pub fn run(paths: &[PathBuf], report_path: Option<&Path>) -> Result<IdCheckReport> {
    let mut checker = IdChecker::new()?;
    checker.scan_paths(paths)?;
    let report = checker.finish();

    for duplicate in &report.duplicates {
        println!(
            "duplicate id {} at {} (first defined at {})",
            duplicate.id, duplicate.again, duplicate.first
        );
    }
    for dangling in &report.dangling {
        println!("dangling ref_id {} at {}", dangling.ref_id, dangling.at);
    }
    println!(
        "{} files, {} ids, {} references: {} duplicates, {} dangling",
        report.files_scanned,
        report.ids,
        report.references,
        report.duplicates.len(),
        report.dangling.len()
    );

    write_report(report_path, "check-ids", &report)?;
    Ok(report)
}
