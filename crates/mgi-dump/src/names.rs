//! Authoritative names for external ids
//!
//! Mapping tables carry names too, but those go stale. Reconcilers take their
//! names from a [`NameSource`] instead, normally a [`NameTable`] loaded from a
//! database export.

use crate::error::Result;
use csv::{ReaderBuilder, StringRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub trait NameSource {
    fn name(&self, id: &str) -> Option<&str>;

    /// Synonyms of `id`, sorted and free of duplicates
    fn synonyms(&self, id: &str) -> Vec<&str>;

    fn contains(&self, id: &str) -> bool {
        self.name(id).is_some()
    }

    /// Every known id, sorted
    fn ids(&self) -> Vec<&str>;
}

/// How the term column of a name export is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TermColumn {
    /// `name; synonym; synonym`
    #[default]
    NameAndSynonyms,
    /// The whole column is the name, `;` included
    Full,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NameEntry {
    name: Option<String>,
    synonyms: BTreeSet<String>,
}

/// In-memory name source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    entries: BTreeMap<String, NameEntry>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name of `id` unless it already has one
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        let entry = self.entries.entry(id.into()).or_default();
        if entry.name.is_none() {
            entry.name = Some(name.into());
        }
    }

    pub fn add_synonym(&mut self, id: impl Into<String>, synonym: impl Into<String>) {
        let synonym = synonym.into();
        if synonym.is_empty() {
            return;
        }
        self.entries.entry(id.into()).or_default().synonyms.insert(synonym);
    }

    /// Record an export term: the first `;`-separated part is the name, the
    /// rest are synonyms
    pub fn insert_term(&mut self, id: &str, term: &str) {
        let mut parts = term.split(';').map(str::trim);
        if let Some(name) = parts.next().filter(|n| !n.is_empty()) {
            self.insert(id, name);
        }
        for synonym in parts {
            self.add_synonym(id, synonym);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.name.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load `accid<TAB>term[<TAB>synonym]` rows; bare accession ids get
    /// `prefix:` in front
    pub fn from_reader<R: Read>(reader: R, prefix: &str) -> Result<Self> {
        Self::from_reader_as(reader, prefix, TermColumn::default())
    }

    /// Like [`NameTable::from_reader`], reading the term column as `column`
    /// says. Text that is not UTF-8 is decoded lossily.
    pub fn from_reader_as<R: Read>(reader: R, prefix: &str, column: TermColumn) -> Result<Self> {
        let mut csv = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut table = NameTable::new();
        let mut skipped = 0usize;
        let mut lossy = 0usize;
        for record in csv.byte_records() {
            let record = record?;
            let record = match StringRecord::from_byte_record(record) {
                Ok(record) => record,
                Err(e) => {
                    lossy += 1;
                    StringRecord::from_byte_record_lossy(e.into_byte_record())
                },
            };
            let Some(accid) = record.get(0).map(str::trim).filter(|a| !a.is_empty()) else {
                skipped += 1;
                continue;
            };
            let id = crate::config::qualify(prefix, accid);
            match (record.get(1).map(str::trim), column) {
                (Some(term), TermColumn::NameAndSynonyms) => table.insert_term(&id, term),
                (Some(term), TermColumn::Full) if !term.is_empty() => table.insert(id.as_str(), term),
                _ => {},
            }
            if let Some(synonyms) = record.get(2) {
                for synonym in synonyms.split(';') {
                    table.add_synonym(id.as_str(), synonym.trim());
                }
            }
        }

        if lossy > 0 {
            warn!(rows = lossy, "Name rows were not UTF-8, decoded lossily");
        }
        debug!(names = table.len(), skipped, "Parsed name table");
        Ok(table)
    }

    pub fn from_file(path: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        Self::from_file_as(path, prefix, TermColumn::default())
    }

    pub fn from_file_as(path: impl AsRef<Path>, prefix: &str, column: TermColumn) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::from_reader_as(File::open(path)?, prefix, column)?;
        info!(path = %path.display(), names = table.len(), "Read name table");
        Ok(table)
    }
}

impl NameSource for NameTable {
    fn name(&self, id: &str) -> Option<&str> {
        self.entries.get(id)?.name.as_deref()
    }

    fn synonyms(&self, id: &str) -> Vec<&str> {
        self.entries
            .get(id)
            .map(|e| e.synonyms.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.name.is_some())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = NameTable::new();
        for (id, name) in iter {
            table.insert(id, name);
        }
        table
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_load_export() {
        let export = "100100\tPrune belly syndrome; PBS;Eagle-Barrett syndrome\n\
                      100100\t\tabdominal muscle deficiency\n\
                      OMIM:176670\tProgeria\n\
                      \tno id\n";
        let table = NameTable::from_reader(export.as_bytes(), "OMIM").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.name("OMIM:100100"), Some("Prune belly syndrome"));
        assert_eq!(
            table.synonyms("OMIM:100100"),
            vec!["Eagle-Barrett syndrome", "PBS", "abdominal muscle deficiency"]
        );
        assert!(table.contains("OMIM:176670"));
        assert!(!table.contains("176670"));
        assert_eq!(table.ids(), vec!["OMIM:100100", "OMIM:176670"]);
    }

    #[test]
    fn test_full_term_column() {
        let export = "100100\tPrune belly syndrome; PBS\t\n\
                      176670\tProgeria\tHutchinson-Gilford\n";
        let table = NameTable::from_reader_as(export.as_bytes(), "OMIM", TermColumn::Full).unwrap();
        assert_eq!(table.name("OMIM:100100"), Some("Prune belly syndrome; PBS"));
        assert!(table.synonyms("OMIM:100100").is_empty());
        assert_eq!(table.synonyms("OMIM:176670"), vec!["Hutchinson-Gilford"]);
    }

    #[test]
    fn test_non_utf8_row_is_decoded_lossily() {
        let export = b"270150\tSj\xf6gren syndrome\n176670\tProgeria\n";
        let table = NameTable::from_reader(export.as_slice(), "OMIM").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.name("OMIM:270150"), Some("Sj\u{fffd}gren syndrome"));
        assert_eq!(table.name("OMIM:176670"), Some("Progeria"));
    }

    #[test]
    fn test_first_name_wins() {
        let mut table: NameTable = vec![("OMIM:1", "first")].into_iter().collect();
        table.insert("OMIM:1", "second");
        assert_eq!(table.name("OMIM:1"), Some("first"));
        assert!(table.synonyms("OMIM:2").is_empty());
    }
}
