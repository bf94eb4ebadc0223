//! OBO stanza format
//!
//! An ontology file is a sequence of stanzas. Each stanza starts with a
//! bracketed type line (`[Term]`, `[Typedef]`) followed by `tag: value` lines
//! and ends at a blank line. The leading stanza may have no type line; it
//! holds file-level metadata (`format-version:`, `default-namespace:`).
//!
//! Tags are kept in file order and may repeat (`alt_id`, `synonym`, `is_a`).
//! The writer is byte-for-byte reproducible: one `tag: value` line per entry,
//! in stored order, and exactly one blank line after every stanza.

use crate::error::{MgiError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Lines starting with this character are comments and never reach a stanza
pub const COMMENT_CHAR: char = '!';

/// Type of a stanza, taken from its bracket line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    /// File-level metadata, no bracket line
    Header,
    Term,
    Typedef,
    Other(String),
}

impl StanzaKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "Term" => StanzaKind::Term,
            "Typedef" => StanzaKind::Typedef,
            other => StanzaKind::Other(other.to_string()),
        }
    }

    /// Text between the brackets, `None` for the header
    pub fn tag(&self) -> Option<&str> {
        match self {
            StanzaKind::Header => None,
            StanzaKind::Term => Some("Term"),
            StanzaKind::Typedef => Some("Typedef"),
            StanzaKind::Other(tag) => Some(tag),
        }
    }
}

/// One `tag: value` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagValue {
    pub tag: String,
    pub value: String,
}

impl TagValue {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// One OBO record: a type plus its ordered tag/value lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    pub kind: StanzaKind,
    pub lines: Vec<TagValue>,
}

impl Stanza {
    pub fn new(kind: StanzaKind) -> Self {
        Self {
            kind,
            lines: Vec::new(),
        }
    }

    /// A `[Term]` stanza starting with `id` and `name` lines
    pub fn term(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(StanzaKind::Term).with("id", id).with("name", name)
    }

    /// Builder-style append
    pub fn with(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(tag, value);
        self
    }

    /// Append a line; new tags always go after the existing ones
    pub fn push(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.lines.push(TagValue::new(tag, value));
    }

    pub fn is_term(&self) -> bool {
        self.kind == StanzaKind::Term
    }

    pub fn is_header(&self) -> bool {
        self.kind == StanzaKind::Header
    }

    /// Value of the first line with `tag`
    pub fn first(&self, tag: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|l| l.tag == tag)
            .map(|l| l.value.as_str())
    }

    /// Values of every line with `tag`, in file order
    pub fn values<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.lines
            .iter()
            .filter(move |l| l.tag == tag)
            .map(|l| l.value.as_str())
    }

    /// Replace the value of the first line with `tag`, or append one.
    /// Returns the previous value.
    pub fn set_first(&mut self, tag: &str, value: impl Into<String>) -> Option<String> {
        match self.lines.iter_mut().find(|l| l.tag == tag) {
            Some(line) => Some(std::mem::replace(&mut line.value, value.into())),
            None => {
                self.push(tag, value);
                None
            },
        }
    }

    pub fn retain(&mut self, f: impl FnMut(&TagValue) -> bool) {
        self.lines.retain(f);
    }

    pub fn id(&self) -> Option<&str> {
        self.first("id")
    }

    pub fn name(&self) -> Option<&str> {
        self.first("name")
    }

    pub fn alt_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.values("alt_id")
    }

    /// Targets of the `is_a` lines with any trailing `! name` comment removed
    pub fn parents(&self) -> impl Iterator<Item = &str> + '_ {
        self.values("is_a").map(ref_target)
    }

    pub fn is_obsolete(&self) -> bool {
        self.first("is_obsolete") == Some("true")
    }

    /// Typed view of a term stanza; `None` for other stanzas or a term
    /// without an `id`
    pub fn to_term(&self) -> Option<Term> {
        if !self.is_term() {
            return None;
        }
        Some(Term {
            id: self.id()?.to_string(),
            name: self.name().unwrap_or_default().to_string(),
            alt_ids: self.alt_ids().map(str::to_string).collect(),
            parents: self.parents().map(str::to_string).collect(),
            is_obsolete: self.is_obsolete(),
        })
    }
}

impl fmt::Display for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = self.kind.tag() {
            writeln!(f, "[{}]", tag)?;
        }
        for line in &self.lines {
            writeln!(f, "{}: {}", line.tag, line.value)?;
        }
        Ok(())
    }
}

/// A vocabulary node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub id: String,
    pub name: String,
    pub alt_ids: Vec<String>,
    pub parents: BTreeSet<String>,
    pub is_obsolete: bool,
}

/// First whitespace-separated token of a reference value.
///
/// `"MESH:D000001 ! Abdomen"` -> `"MESH:D000001"`
pub fn ref_target(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or("")
}

// ============================================================================
// Reader
// ============================================================================

/// Streaming stanza reader over any buffered source
pub struct OboReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    pending_kind: Option<StanzaKind>,
    done: bool,
}

impl<R: BufRead> OboReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            pending_kind: None,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for OboReader<R> {
    type Item = Result<Stanza>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut kind = self.pending_kind.take().unwrap_or(StanzaKind::Header);
        let mut lines = Vec::new();

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                },
                None => {
                    self.done = true;
                    break;
                },
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.starts_with(COMMENT_CHAR) {
                continue;
            }
            if trimmed.is_empty() {
                if lines.is_empty() {
                    continue;
                }
                break;
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let Some(end) = rest.find(']') else {
                    self.done = true;
                    return Some(Err(MgiError::parse(self.line_no, "unterminated stanza type")));
                };
                let next_kind = StanzaKind::from_tag(&rest[..end]);
                if lines.is_empty() {
                    kind = next_kind;
                    continue;
                }
                // a type line without a separating blank line starts a new stanza
                self.pending_kind = Some(next_kind);
                break;
            }

            match trimmed.split_once(':') {
                Some((tag, value)) => lines.push(TagValue::new(tag.trim(), value.trim())),
                None => debug!(line = self.line_no, "Ignoring OBO line without a tag"),
            }
        }

        if lines.is_empty() {
            return None;
        }
        Some(Ok(Stanza { kind, lines }))
    }
}

/// Parse a whole document held in memory
pub fn parse_str(content: &str) -> Result<Vec<Stanza>> {
    OboReader::new(content.as_bytes()).collect()
}

/// Read every stanza of an `.obo` file
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<Stanza>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let stanzas: Vec<Stanza> = OboReader::new(BufReader::new(file)).collect::<Result<_>>()?;
    info!(
        path = %path.display(),
        stanzas = stanzas.len(),
        terms = stanzas.iter().filter(|s| s.is_term()).count(),
        "Read OBO file"
    );
    Ok(stanzas)
}

// ============================================================================
// Writer
// ============================================================================

/// Render one stanza without its trailing blank line
pub fn format_stanza(stanza: &Stanza) -> String {
    stanza.to_string()
}

/// Write stanzas, each followed by exactly one blank line
pub fn write_stanzas<W: Write>(writer: &mut W, stanzas: &[Stanza]) -> Result<()> {
    for stanza in stanzas {
        write!(writer, "{}", stanza)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Render a whole document
pub fn to_string(stanzas: &[Stanza]) -> String {
    let mut out = String::new();
    for stanza in stanzas {
        out.push_str(&format_stanza(stanza));
        out.push('\n');
    }
    out
}

pub fn write_file(path: impl AsRef<Path>, stanzas: &[Stanza]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_stanzas(&mut writer, stanzas)?;
    info!(path = %path.display(), stanzas = stanzas.len(), "Wrote OBO file");
    Ok(())
}

// ============================================================================
// Consistency
// ============================================================================

/// Identity problems found in a finished ontology
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Consistency {
    /// Primary ids carried by more than one term
    pub duplicate_ids: Vec<String>,

    /// alt_ids claimed by more than one term, or equal to another term's id
    pub shared_alt_ids: Vec<String>,

    /// `(child, parent)` pairs whose parent is not a known id or alt_id
    pub dangling_parents: Vec<(String, String)>,
}

impl Consistency {
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids.is_empty()
            && self.shared_alt_ids.is_empty()
            && self.dangling_parents.is_empty()
    }
}

/// Check the file-level identity invariants over complete stanza list
pub fn check_consistency(stanzas: &[Stanza]) -> Consistency {
    let terms: Vec<Term> = stanzas.iter().filter_map(Stanza::to_term).collect();

    let mut id_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for term in &terms {
        *id_counts.entry(term.id.as_str()).or_default() += 1;
    }

    let mut alt_owners: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for term in &terms {
        for alt in &term.alt_ids {
            alt_owners.entry(alt.as_str()).or_default().insert(term.id.as_str());
        }
    }

    let duplicate_ids = id_counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(id, _)| id.to_string())
        .collect();

    let shared_alt_ids = alt_owners
        .iter()
        .filter(|(alt, owners)| owners.len() > 1 || id_counts.contains_key(*alt))
        .map(|(alt, _)| alt.to_string())
        .collect();

    let mut dangling_parents = Vec::new();
    for term in &terms {
        for parent in &term.parents {
            if !id_counts.contains_key(parent.as_str()) && !alt_owners.contains_key(parent.as_str()) {
                dangling_parents.push((term.id.clone(), parent.clone()));
            }
        }
    }

    Consistency {
        duplicate_ids,
        shared_alt_ids,
        dangling_parents,
    }
}
