//! Cross-mapping table
//!
//! Tab-delimited rows asserting where an external id belongs in the internal
//! vocabulary. Columns:
//!
//! | # | content                       |
//! |---|-------------------------------|
//! | 0 | target term name              |
//! | 1 | target term id (bare)         |
//! | 2 | source-system action (`M`/`L`)|
//! | 3 | desired action (`M`/`L`)      |
//! | 4 | external term name            |
//! | 5 | external id (bare, numeric)   |
//! | 6 | external type code            |
//!
//! Anything after column 6 is ignored. Rows with fewer than seven columns, a
//! non-numeric external id or text that is not UTF-8 are skipped and counted;
//! upstream exports are noisy and drop trailing columns on some lines.

use crate::config::Namespaces;
use crate::error::Result;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns a row needs to be considered
pub const MIN_COLUMNS: usize = 7;

/// Whether an external id is folded into its target or stands alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Action {
    /// Becomes an alternate id of the target term
    Merge,
    /// Becomes a child term of the target
    Leaf,
}

impl Action {
    /// `M` is a merge; every other code is a leaf
    pub fn from_code(code: &str) -> Self {
        if code.trim() == "M" {
            Action::Merge
        } else {
            Action::Leaf
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Action::Merge => "M",
            Action::Leaf => "L",
        }
    }
}

/// One usable row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossMapping {
    pub external_id: String,
    pub target_id: String,
    pub source_action: Action,
    pub desired_action: Action,
    /// Not authoritative; only a last-resort fallback
    pub external_name: String,
    /// Not authoritative; only a last-resort fallback
    pub target_name: String,
    pub external_type_code: String,
}

impl CrossMapping {
    /// Build a mapping from raw columns; `None` for rows that fail the shape
    /// check
    pub fn from_fields(fields: &[&str], namespaces: &Namespaces) -> Option<Self> {
        if fields.len() < MIN_COLUMNS {
            return None;
        }
        let external = fields[5].trim();
        if external.is_empty() || !external.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            external_id: namespaces.qualify_external(external),
            target_id: namespaces.qualify_internal(fields[1]),
            source_action: Action::from_code(fields[2]),
            desired_action: Action::from_code(fields[3]),
            external_name: fields[4].trim().to_string(),
            target_name: fields[0].trim().to_string(),
            external_type_code: fields[6].trim().to_string(),
        })
    }
}

/// Parsed table plus the number of rows that were skipped
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    pub rows: Vec<CrossMapping>,
    pub skipped: usize,
}

impl MappingTable {
    pub fn from_reader<R: Read>(reader: R, namespaces: &Namespaces) -> Result<Self> {
        let mut csv = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut table = MappingTable::default();
        for record in csv.byte_records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let Ok(record) = StringRecord::from_byte_record(record) else {
                warn!(line, "Skipping cross-mapping row that is not UTF-8");
                table.skipped += 1;
                continue;
            };
            let fields: Vec<&str> = record.iter().collect();
            match CrossMapping::from_fields(&fields, namespaces) {
                Some(mapping) => table.rows.push(mapping),
                None => table.skipped += 1,
            }
        }

        debug!(rows = table.rows.len(), skipped = table.skipped, "Parsed cross-mapping table");
        Ok(table)
    }

    pub fn from_file(path: impl AsRef<Path>, namespaces: &Namespaces) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::from_reader(File::open(path)?, namespaces)?;
        info!(
            path = %path.display(),
            rows = table.rows.len(),
            skipped = table.skipped,
            "Read cross-mapping table"
        );
        Ok(table)
    }
}
