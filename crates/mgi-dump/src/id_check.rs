//! Item-file id checker
//!
//! Scans rendered item files for `id="…"` definitions and `ref_id="…"`
//! references. Reports the first duplicate definition of every id and every
//! reference that no scanned file defines.

use crate::error::Result;
use quick_xml::escape::unescape;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `id="…"` or `ref_id="…"`; `uuid="…"` and friends do not count
const ID_ATTRIBUTE: &str = r#"\b(ref_)?id *= *"([^"]+)""#;

/// Where an id was seen
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duplicate {
    pub id: String,
    pub first: Location,
    pub again: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dangling {
    pub ref_id: String,
    pub at: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdCheckReport {
    pub files_scanned: usize,
    pub ids: usize,
    pub references: usize,
    pub duplicates: Vec<Duplicate>,
    pub dangling: Vec<Dangling>,
}

impl IdCheckReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.dangling.is_empty()
    }
}

#[derive(Debug)]
pub struct IdChecker {
    pattern: Regex,
    files_scanned: usize,
    defined: BTreeMap<String, Location>,
    duplicates: BTreeMap<String, Duplicate>,
    references: Vec<(String, Location)>,
}

impl IdChecker {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(ID_ATTRIBUTE)?,
            files_scanned: 0,
            defined: BTreeMap::new(),
            duplicates: BTreeMap::new(),
            references: Vec::new(),
        })
    }

    /// Scan files; a directory contributes the files directly inside it
    pub fn scan_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                let mut files: Vec<PathBuf> = fs::read_dir(path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file())
                    .collect();
                files.sort();
                for file in files {
                    self.scan_file(&file)?;
                }
            } else {
                self.scan_file(path)?;
            }
        }
        Ok(())
    }

    pub fn scan_file(&mut self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "Scanning item file");
        let content = fs::read_to_string(path)?;
        self.scan_str(path, &content)
    }

    /// Scan `content` as if it were the file at `path`
    pub fn scan_str(&mut self, path: &Path, content: &str) -> Result<()> {
        self.files_scanned += 1;
        for (index, line) in content.lines().enumerate() {
            for captures in self.pattern.captures_iter(line) {
                let is_ref = captures.get(1).is_some();
                let Some(raw) = captures.get(2) else {
                    continue;
                };
                let id = unescape(raw.as_str())?.into_owned();
                let at = Location {
                    file: path.to_path_buf(),
                    line: index + 1,
                };
                if is_ref {
                    self.references.push((id, at));
                } else if let Some(first) = self.defined.get(&id) {
                    self.duplicates.entry(id.clone()).or_insert_with(|| Duplicate {
                        id,
                        first: first.clone(),
                        again: at,
                    });
                } else {
                    self.defined.insert(id, at);
                }
            }
        }
        Ok(())
    }

    /// Resolve references against every definition seen so far
    pub fn finish(self) -> IdCheckReport {
        let dangling: Vec<Dangling> = self
            .references
            .iter()
            .filter(|(id, _)| !self.defined.contains_key(id))
            .map(|(id, at)| Dangling {
                ref_id: id.clone(),
                at: at.clone(),
            })
            .collect();

        for duplicate in self.duplicates.values() {
            warn!(id = %duplicate.id, first = %duplicate.first, again = %duplicate.again, "Duplicate item id");
        }
        for dangling in &dangling {
            warn!(ref_id = %dangling.ref_id, at = %dangling.at, "Reference to undefined item");
        }

        let report = IdCheckReport {
            files_scanned: self.files_scanned,
            ids: self.defined.len(),
            references: self.references.len(),
            duplicates: self.duplicates.into_values().collect(),
            dangling,
        };
        info!(
            files = report.files_scanned,
            ids = report.ids,
            references = report.references,
            duplicates = report.duplicates.len(),
            dangling = report.dangling.len(),
            "Checked item ids"
        );
        report
    }
}
