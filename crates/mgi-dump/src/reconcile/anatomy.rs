//! Anatomy vocabulary merge
//!
//! Builds one anatomy tree out of the staged developmental vocabulary (EMAP)
//! and the adult vocabulary (MA), then hangs every GXD anatomical structure
//! on it:
//!
//! - MA term names get the adult stage marker (`TS28 `)
//! - the MA root becomes obsolete and its children move under `EMAP:0`
//! - each GXD structure is placed by the first matcher that accepts it:
//!   [`IdMatcher`], then [`NameMatcher`], then the [`TermSynthesizer`], which
//!   always produces a term
//! - `part_of` references to GXD ids are redirected to the term that absorbed
//!   them, and conceptus structures are pinned to fixed EMAP parents
//!
//! [`normalize_emapa`] is the companion clean-up for the abstract EMAPA file.

use crate::error::Result;
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use mgi_common::obo::{ref_target, Stanza, StanzaKind, TagValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Stage every adult (MA) term belongs to
pub const MA_STAGE: u32 = 28;

pub const MA_ROOT: &str = "MA:0000001";

/// Replacement parent for the children of [`MA_ROOT`]
pub const EMAP_ROOT_IS_A: &str = "EMAP:0 ! stage specific anatomical structure";

/// GXD structures that map onto an EMAP term under a slightly different name
pub const DEFAULT_OVERRIDES: &str = include_str!("../../data/mgi2emap.tsv");

/// Conceptus structures and the EMAP term each one is part of
pub const DEFAULT_CONCEPTUS: &str = include_str!("../../data/conceptus.tsv");

// ============================================================================
// Inputs
// ============================================================================

/// One GXD anatomical structure, as exported with a header row
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GxdStructure {
    pub mgi_id: String,
    pub edinburgh_key: Option<String>,
    pub ma_id: Option<String>,
    pub print_name: String,
    pub stage: u32,
    pub parent_name: Option<String>,
    pub parent_edinburgh: Option<String>,
    pub parent_mgi: Option<String>,
    pub parent_ma: Option<String>,
}

impl GxdStructure {
    /// `TS07 embryo`
    pub fn staged_name(&self) -> String {
        format!("TS{:02} {}", self.stage, self.print_name)
    }
}

/// Read the structure export. Text that is not UTF-8 is decoded lossily.
pub fn read_structures<R: Read>(reader: R) -> Result<Vec<GxdStructure>> {
    let mut csv = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .from_reader(reader);
    let headers = StringRecord::from_byte_record_lossy(csv.byte_headers()?.clone());

    let mut structures = Vec::new();
    let mut lossy = 0usize;
    for record in csv.byte_records() {
        let record = decode_lossy(record?, &mut lossy);
        structures.push(record.deserialize::<GxdStructure>(Some(&headers))?);
    }
    if lossy > 0 {
        warn!(rows = lossy, "GXD structure rows were not UTF-8, decoded lossily");
    }
    debug!(structures = structures.len(), "Parsed GXD structures");
    Ok(structures)
}

fn decode_lossy(record: ByteRecord, lossy: &mut usize) -> StringRecord {
    StringRecord::from_byte_record(record).unwrap_or_else(|e| {
        *lossy += 1;
        StringRecord::from_byte_record_lossy(e.into_byte_record())
    })
}

pub fn read_structures_file(path: impl AsRef<Path>) -> Result<Vec<GxdStructure>> {
    let path = path.as_ref();
    let structures = read_structures(File::open(path)?)?;
    info!(path = %path.display(), structures = structures.len(), "Read GXD structures");
    Ok(structures)
}

/// Two-column `from<TAB>to` table; `#` starts a comment line
pub fn parse_id_table<R: Read>(reader: R) -> Result<BTreeMap<String, String>> {
    let mut csv = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut table = BTreeMap::new();
    let mut lossy = 0usize;
    for record in csv.byte_records() {
        let record = decode_lossy(record?, &mut lossy);
        if let (Some(from), Some(to)) = (record.get(0), record.get(1)) {
            let (from, to) = (from.trim(), to.trim());
            if !from.is_empty() && !to.is_empty() {
                table.insert(from.to_string(), to.to_string());
            }
        }
    }
    if lossy > 0 {
        warn!(rows = lossy, "Id table rows were not UTF-8, decoded lossily");
    }
    Ok(table)
}

pub fn read_id_table(path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
    let path = path.as_ref();
    let table = parse_id_table(File::open(path)?)?;
    info!(path = %path.display(), entries = table.len(), "Read id table");
    Ok(table)
}

// ============================================================================
// Term index and matchers
// ============================================================================

/// Position of a term in a [`TermIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TermRef(pub usize);

/// Existing terms, addressable by id and by name
#[derive(Debug, Default)]
pub struct TermIndex {
    terms: Vec<Stanza>,
    by_id: HashMap<String, TermRef>,
    by_name: HashMap<String, Vec<TermRef>>,
}

impl TermIndex {
    pub fn new(stanzas: impl IntoIterator<Item = Stanza>) -> Self {
        let mut index = TermIndex::default();
        for stanza in stanzas {
            let Some(id) = stanza.id().map(str::to_string) else {
                warn!("Skipping anatomy term without an id");
                continue;
            };
            if index.by_id.contains_key(&id) {
                warn!(id = %id, "Duplicate anatomy term, keeping the first");
                continue;
            }
            let term = TermRef(index.terms.len());
            if let Some(name) = stanza.name() {
                index.by_name.entry(name.to_string()).or_default().push(term);
            }
            index.by_id.insert(id, term);
            index.terms.push(stanza);
        }
        index
    }

    pub fn get(&self, id: &str) -> Option<TermRef> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn named(&self, name: &str) -> &[TermRef] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn id_of(&self, term: TermRef) -> Option<&str> {
        self.terms.get(term.0)?.id()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn add_alt_id(&mut self, term: TermRef, alt_id: &str) {
        if let Some(stanza) = self.terms.get_mut(term.0) {
            stanza.push("alt_id", alt_id);
        }
    }

    fn into_stanzas(self) -> Vec<Stanza> {
        self.terms
    }
}

/// One strategy for finding existing terms that denote a GXD structure
pub trait TermMatcher {
    fn label(&self) -> &'static str;

    /// Matching terms, or `None` when this strategy finds nothing
    fn try_match(&self, structure: &GxdStructure, terms: &TermIndex) -> Option<Vec<TermRef>>;
}

/// Match on the structure's MA id and its EMAP id (after overrides). Both can
/// match.
#[derive(Debug, Default)]
pub struct IdMatcher {
    overrides: BTreeMap<String, String>,
}

impl IdMatcher {
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    fn emap_id<'a>(&'a self, structure: &'a GxdStructure) -> Option<&'a str> {
        self.overrides
            .get(&structure.mgi_id)
            .map(String::as_str)
            .or(structure.edinburgh_key.as_deref())
    }
}

impl TermMatcher for IdMatcher {
    fn label(&self) -> &'static str {
        "id"
    }

    fn try_match(&self, structure: &GxdStructure, terms: &TermIndex) -> Option<Vec<TermRef>> {
        let mut matched = Vec::new();
        for id in [structure.ma_id.as_deref(), self.emap_id(structure)].into_iter().flatten() {
            if let Some(term) = terms.get(id) {
                if !matched.contains(&term) {
                    matched.push(term);
                }
            }
        }
        (!matched.is_empty()).then_some(matched)
    }
}

/// Match on the staged name, `TS<stage> <print name>`
#[derive(Debug, Default)]
pub struct NameMatcher;

impl TermMatcher for NameMatcher {
    fn label(&self) -> &'static str {
        "name"
    }

    fn try_match(&self, structure: &GxdStructure, terms: &TermIndex) -> Option<Vec<TermRef>> {
        let matched = terms.named(&structure.staged_name());
        (!matched.is_empty()).then(|| matched.to_vec())
    }
}

/// Last resort: a new term for the structure, attached to the best parent
/// available
#[derive(Debug, Default)]
pub struct TermSynthesizer;

impl TermSynthesizer {
    /// Parent preference: MA parent, then EMAP parent, then the raw GXD
    /// parent. A preferred parent that is not a known term falls back to the
    /// GXD parent.
    pub fn parent<'a>(&self, structure: &'a GxdStructure, terms: &TermIndex) -> Option<&'a str> {
        let preferred = structure
            .parent_ma
            .as_deref()
            .or(structure.parent_edinburgh.as_deref())
            .or(structure.parent_mgi.as_deref());
        match preferred {
            Some(parent) if terms.contains(parent) => Some(parent),
            _ => structure.parent_mgi.as_deref(),
        }
    }

    pub fn synthesize(&self, structure: &GxdStructure, terms: &TermIndex) -> Stanza {
        let mut term = Stanza::term(structure.mgi_id.as_str(), structure.staged_name());
        match self.parent(structure, terms) {
            Some(parent) => {
                let value = match structure.parent_name.as_deref() {
                    Some(name) => format!("part_of {} ! {}", parent, name),
                    None => format!("part_of {}", parent),
                };
                term.push("relationship", value);
            },
            None => warn!(mgi_id = %structure.mgi_id, "Structure has no parent, writing it as a root term"),
        }
        term
    }
}

// ============================================================================
// Merge
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnatomyReport {
    pub existing_terms: usize,
    pub reparented: usize,
    pub structures: usize,
    pub matched_by_id: usize,
    pub matched_by_name: usize,
    pub mapped_to_emap: usize,
    pub mapped_to_ma: usize,
    pub new_terms: usize,
    pub parentless: Vec<String>,
    pub part_of_rewritten: usize,
    pub conceptus_pinned: usize,
}

pub struct AnatomyMerger {
    matchers: Vec<Box<dyn TermMatcher>>,
    synthesizer: TermSynthesizer,
    conceptus: BTreeMap<String, String>,
}

impl AnatomyMerger {
    pub fn new(overrides: BTreeMap<String, String>, conceptus: BTreeMap<String, String>) -> Self {
        Self {
            matchers: vec![Box::new(IdMatcher::new(overrides)), Box::new(NameMatcher)],
            synthesizer: TermSynthesizer,
            conceptus,
        }
    }

    /// Merger loaded with the built-in override and conceptus tables
    pub fn with_default_tables() -> Result<Self> {
        Ok(Self::new(
            parse_id_table(DEFAULT_OVERRIDES.as_bytes())?,
            parse_id_table(DEFAULT_CONCEPTUS.as_bytes())?,
        ))
    }

    pub fn merge(
        &self,
        emap: Vec<Stanza>,
        ma: Vec<Stanza>,
        structures: &[GxdStructure],
    ) -> (Vec<Stanza>, AnatomyReport) {
        let mut report = AnatomyReport {
            structures: structures.len(),
            ..AnatomyReport::default()
        };

        let (emap_terms, others): (Vec<Stanza>, Vec<Stanza>) = emap.into_iter().partition(Stanza::is_term);
        let (ma_terms, reparented) = stage_ma_terms(ma);
        report.reparented = reparented;

        let mut index = TermIndex::new(emap_terms.into_iter().chain(ma_terms));
        report.existing_terms = index.len();

        let mut new_terms = Vec::new();
        for structure in structures {
            let matched = self
                .matchers
                .iter()
                .find_map(|m| m.try_match(structure, &index).map(|terms| (m.label(), terms)));

            let Some((label, terms)) = matched else {
                let term = self.synthesizer.synthesize(structure, &index);
                if term.first("relationship").is_none() {
                    report.parentless.push(structure.mgi_id.clone());
                }
                new_terms.push(term);
                report.new_terms += 1;
                continue;
            };

            match label {
                "id" => report.matched_by_id += 1,
                _ => report.matched_by_name += 1,
            }
            for term in terms {
                if index.id_of(term).is_some_and(|id| id.starts_with("MA:")) {
                    report.mapped_to_ma += 1;
                } else {
                    report.mapped_to_emap += 1;
                }
                index.add_alt_id(term, &structure.mgi_id);
            }
        }

        info!(
            terms = report.existing_terms,
            mapped_to_emap = report.mapped_to_emap,
            mapped_to_ma = report.mapped_to_ma,
            new_terms = report.new_terms,
            "Placed GXD structures"
        );

        let mut output = others;
        output.extend(new_terms);
        output.extend(index.into_stanzas());

        let (rewritten, pinned) = fix_part_of(&mut output, &self.conceptus);
        report.part_of_rewritten = rewritten;
        report.conceptus_pinned = pinned;

        (output, report)
    }
}

/// Tag MA names with the adult stage and retire the MA root. Non-term stanzas
/// are dropped. Returns the terms and the number of re-parented children.
pub fn stage_ma_terms(ma: Vec<Stanza>) -> (Vec<Stanza>, usize) {
    let mut reparented = 0;
    let mut terms = Vec::new();
    for mut stanza in ma.into_iter().filter(Stanza::is_term) {
        for line in stanza.lines.iter_mut() {
            match line.tag.as_str() {
                "name" => line.value = format!("TS{} {}", MA_STAGE, line.value),
                "is_a" if ref_target(&line.value) == MA_ROOT => {
                    line.value = EMAP_ROOT_IS_A.to_string();
                    reparented += 1;
                },
                _ => {},
            }
        }
        if stanza.id() == Some(MA_ROOT) {
            stanza.push("is_obsolete", "true");
        }
        terms.push(stanza);
    }
    (terms, reparented)
}

/// Redirect `part_of` references from absorbed ids to their term and pin
/// conceptus terms. Returns `(rewritten, pinned)` line counts.
pub fn fix_part_of(stanzas: &mut [Stanza], conceptus: &BTreeMap<String, String>) -> (usize, usize) {
    let mut absorbed: HashMap<String, String> = HashMap::new();
    let mut names: HashMap<String, String> = HashMap::new();
    for stanza in stanzas.iter().filter(|s| s.is_term()) {
        let Some(id) = stanza.id() else {
            continue;
        };
        if let Some(name) = stanza.name() {
            names.insert(id.to_string(), name.to_string());
        }
        for alt in stanza.alt_ids() {
            absorbed.insert(alt.to_string(), id.to_string());
        }
    }

    let part_of = |target: &str| match names.get(target) {
        Some(name) => format!("part_of {} ! {}", target, name),
        None => format!("part_of {}", target),
    };

    let (mut rewritten, mut pinned) = (0, 0);
    for stanza in stanzas.iter_mut().filter(|s| s.is_term()) {
        let fixed_parent = stanza.id().and_then(|id| conceptus.get(id)).cloned();
        for line in stanza.lines.iter_mut().filter(|l| l.tag == "relationship") {
            if let Some(parent) = &fixed_parent {
                line.value = part_of(parent);
                pinned += 1;
                continue;
            }
            let Some(rest) = line.value.strip_prefix("part_of") else {
                continue;
            };
            if let Some(term) = absorbed.get(ref_target(rest)) {
                line.value = part_of(term);
                rewritten += 1;
            }
        }
    }
    debug!(rewritten, pinned, "Fixed part_of references");
    (rewritten, pinned)
}

// ============================================================================
// EMAPA
// ============================================================================

pub const EMAPA_PREFIX: &str = "EMAPA:";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmapaReport {
    pub kept: usize,
    pub dropped: usize,
    pub stage_lines: usize,
}

/// Keep typedefs and `EMAPA:` terms; `relationship: starts_at TS07` becomes
/// `starts_at: 7` (likewise `ends_at`)
pub fn normalize_emapa(stanzas: Vec<Stanza>) -> (Vec<Stanza>, EmapaReport) {
    let mut report = EmapaReport::default();
    let mut output = Vec::new();

    for mut stanza in stanzas {
        let keep = match stanza.kind {
            StanzaKind::Typedef => true,
            _ => stanza.id().is_none_or(|id| id.starts_with(EMAPA_PREFIX)),
        };
        if !keep {
            report.dropped += 1;
            continue;
        }

        if stanza.kind != StanzaKind::Typedef {
            for line in stanza.lines.iter_mut().filter(|l| l.tag == "relationship") {
                let mut tokens = line.value.split_whitespace();
                let (Some(relation @ ("starts_at" | "ends_at")), Some(stage)) = (tokens.next(), tokens.next()) else {
                    continue;
                };
                match stage.strip_prefix("TS").and_then(|n| n.parse::<u32>().ok()) {
                    Some(stage) => {
                        *line = TagValue::new(relation, stage.to_string());
                        report.stage_lines += 1;
                    },
                    None => warn!(value = %line.value, "Unrecognised stage reference"),
                }
            }
        }

        report.kept += 1;
        output.push(stanza);
    }

    info!(kept = report.kept, dropped = report.dropped, "Normalised EMAPA file");
    (output, report)
}
