//! Identifier & reference registry
//!
//! The only path by which output items get ids and by which other items refer
//! to them. One [`Registry`] is built per extraction run and handed to every
//! component of that run; nothing about it survives the run, since sequence
//! numbers and natural-key mappings are not stable across runs.
//!
//! Guarantees, when strict checking is on:
//!
//! - a `(type, natural key)` pair is defined at most once;
//! - a reference resolves only to an id that was defined *and* written
//!   (a record can be minted and later dropped by a filter);
//! - an id is written at most once.
//!
//! Ids that were merged into another item are aliased; every read path goes
//! through the alias map first.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Source-database primary key. Negative values are upstream sentinels
/// ("Not Specified" = -1, "Not Applicable" = -2).
pub type NaturalKey = i64;

/// First sequence number handed out for a type
pub const DEFAULT_SEQUENCE_START: u64 = 1001;

/// Offset that moves negative natural keys into the positive range
pub const NEGATIVE_KEY_OFFSET: u64 = 10_000_000;

// ============================================================================
// Type keys and item ids
// ============================================================================

/// Numeric item type, the first half of every item id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey(pub u32);

impl TypeKey {
    // Source-database object types
    pub const REFERENCE: TypeKey = TypeKey(1);
    pub const MARKER: TypeKey = TypeKey(2);
    pub const PROBE: TypeKey = TypeKey(3);
    pub const ANTIBODY: TypeKey = TypeKey(6);
    pub const ASSAY: TypeKey = TypeKey(8);
    pub const IMAGE: TypeKey = TypeKey(9);
    pub const STRAIN: TypeKey = TypeKey(10);
    pub const ALLELE: TypeKey = TypeKey(11);
    pub const GENOTYPE: TypeKey = TypeKey(12);
    pub const VOCABULARY_TERM: TypeKey = TypeKey(13);
    pub const ORGANISM: TypeKey = TypeKey(20);
    pub const CHROMOSOME: TypeKey = TypeKey(27);

    // Output-only types
    pub const HOMOLOGUE: TypeKey = TypeKey(10001);
    pub const ORTHOLOGUE_EVIDENCE: TypeKey = TypeKey(10002);
    pub const ORTHOLOGUE_EVIDENCE_CODE: TypeKey = TypeKey(10003);
    pub const LOCATION: TypeKey = TypeKey(10004);
    pub const GENOTYPE_ALLELE_PAIR: TypeKey = TypeKey(10005);
    pub const ONTOLOGY_ANNOTATION: TypeKey = TypeKey(10006);
    pub const ONTOLOGY_ANNOTATION_EVIDENCE: TypeKey = TypeKey(10007);
    pub const ONTOLOGY_ANNOTATION_EVIDENCE_CODE: TypeKey = TypeKey(10008);
    pub const SYNONYM: TypeKey = TypeKey(10009);
    pub const DATA_SOURCE: TypeKey = TypeKey(10010);
    pub const DATA_SET: TypeKey = TypeKey(10011);
    pub const CROSS_REFERENCE: TypeKey = TypeKey(10012);
    pub const AUTHOR: TypeKey = TypeKey(10013);
    pub const SO_TERM: TypeKey = TypeKey(10014);
    pub const SYNTENIC_REGION: TypeKey = TypeKey(10015);
    pub const ALLELE_MOLECULAR_MUTATION: TypeKey = TypeKey(10016);
    pub const CELL_LINE: TypeKey = TypeKey(10017);
    pub const CELL_LINE_DERIVATION: TypeKey = TypeKey(10018);
    pub const EXPRESSION: TypeKey = TypeKey(10019);
    pub const EMAPA_TERM: TypeKey = TypeKey(10020);
    pub const ALLELE_ATTRIBUTE: TypeKey = TypeKey(10021);
    pub const DIRECTED_RELATIONSHIP: TypeKey = TypeKey(10022);
    pub const DIRECTED_RELATIONSHIP_PROPERTY: TypeKey = TypeKey(10023);
    pub const PROTEIN: TypeKey = TypeKey(10024);
    pub const COMMENT: TypeKey = TypeKey(10025);

    const NAMES: &'static [(&'static str, TypeKey)] = &[
        ("Reference", TypeKey::REFERENCE),
        ("Marker", TypeKey::MARKER),
        ("Probe", TypeKey::PROBE),
        ("Antibody", TypeKey::ANTIBODY),
        ("Assay", TypeKey::ASSAY),
        ("Image", TypeKey::IMAGE),
        ("Strain", TypeKey::STRAIN),
        ("Allele", TypeKey::ALLELE),
        ("Genotype", TypeKey::GENOTYPE),
        ("Vocabulary Term", TypeKey::VOCABULARY_TERM),
        ("Organism", TypeKey::ORGANISM),
        ("Chromosome", TypeKey::CHROMOSOME),
        ("Homologue", TypeKey::HOMOLOGUE),
        ("OrthologueEvidence", TypeKey::ORTHOLOGUE_EVIDENCE),
        ("OrthologueEvidenceCode", TypeKey::ORTHOLOGUE_EVIDENCE_CODE),
        ("Location", TypeKey::LOCATION),
        ("GenotypeAllelePair", TypeKey::GENOTYPE_ALLELE_PAIR),
        ("OntologyAnnotation", TypeKey::ONTOLOGY_ANNOTATION),
        ("OntologyAnnotationEvidence", TypeKey::ONTOLOGY_ANNOTATION_EVIDENCE),
        ("OntologyAnnotationEvidenceCode", TypeKey::ONTOLOGY_ANNOTATION_EVIDENCE_CODE),
        ("Synonym", TypeKey::SYNONYM),
        ("DataSource", TypeKey::DATA_SOURCE),
        ("DataSet", TypeKey::DATA_SET),
        ("CrossReference", TypeKey::CROSS_REFERENCE),
        ("Author", TypeKey::AUTHOR),
        ("SOTerm", TypeKey::SO_TERM),
        ("SyntenicRegion", TypeKey::SYNTENIC_REGION),
        ("AlleleMolecularMutation", TypeKey::ALLELE_MOLECULAR_MUTATION),
        ("CellLine", TypeKey::CELL_LINE),
        ("CellLineDerivation", TypeKey::CELL_LINE_DERIVATION),
        ("Expression", TypeKey::EXPRESSION),
        ("EMAPATerm", TypeKey::EMAPA_TERM),
        ("AlleleAttribute", TypeKey::ALLELE_ATTRIBUTE),
        ("DirectedRelationship", TypeKey::DIRECTED_RELATIONSHIP),
        ("DirectedRelationshipProperty", TypeKey::DIRECTED_RELATIONSHIP_PROPERTY),
        ("Protein", TypeKey::PROTEIN),
        ("Comment", TypeKey::COMMENT),
    ];

    /// Look a type up by its source-database or output class name
    pub fn from_name(name: &str) -> Option<TypeKey> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, key)| *key)
    }

    pub fn name(self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(_, key)| *key == self)
            .map(|(n, _)| *n)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique item id. Serialized as `"<type>_<local>"` only at the
/// output boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    pub type_key: TypeKey,
    pub local: u64,
}

impl ItemId {
    pub fn new(type_key: TypeKey, local: u64) -> Self {
        Self { type_key, local }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.type_key.0, self.local)
    }
}

impl FromStr for ItemId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_part, local_part) = s
            .split_once('_')
            .ok_or_else(|| format!("Invalid item id (expected <type>_<local>): {}", s))?;
        let type_key = type_part
            .parse::<u32>()
            .map_err(|e| format!("Invalid item type in '{}': {}", s, e))?;
        let local = local_part
            .parse::<u64>()
            .map_err(|e| format!("Invalid local key in '{}': {}", s, e))?;
        Ok(ItemId::new(TypeKey(type_key), local))
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Map a natural key onto the local part of an id.
///
/// Non-negative keys are used as they are. Negative sentinels are shifted by
/// [`NEGATIVE_KEY_OFFSET`] (`-1` -> `9999999`); the shift is a bijection on
/// `u64`, so distinct sentinels never share a local key.
pub fn remap_natural_key(key: NaturalKey) -> u64 {
    if key >= 0 {
        key.unsigned_abs()
    } else {
        NEGATIVE_KEY_OFFSET.wrapping_add_signed(key)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a reference could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanglingReason {
    /// No id was ever defined for the natural key
    NeverDefined,
    /// The id was defined but its record was never written
    NeverWritten(ItemId),
}

impl fmt::Display for DanglingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DanglingReason::NeverDefined => write!(f, "never defined"),
            DanglingReason::NeverWritten(id) => write!(f, "{} was defined but never written", id),
        }
    }
}

/// The two ways the registry refuses a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An id was defined or written twice. Signals a bug in the calling
    /// component and aborts that component.
    #[error("Duplicate item id {id}")]
    DuplicateId { id: ItemId },

    /// A reference target does not exist in the output. Callers may drop the
    /// single record that holds the reference and carry on.
    #[error("Dangling reference to type {type_key} key {key}: {reason}")]
    DanglingReference {
        type_key: TypeKey,
        key: NaturalKey,
        reason: DanglingReason,
    },
}

impl RegistryError {
    /// True when only the current output record has to be dropped
    pub fn is_skippable(&self) -> bool {
        matches!(self, RegistryError::DanglingReference { .. })
    }
}

// ============================================================================
// Registry
// ============================================================================

/// How natural keys become local ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    /// Every natural key is memoised to a fresh sequence number
    #[default]
    Sequenced,
    /// The natural key is the local id; synthetic sequences skip past it
    Natural,
}

impl FromStr for KeyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequenced" | "sequence" => Ok(KeyScheme::Sequenced),
            "natural" => Ok(KeyScheme::Natural),
            _ => Err(format!("Invalid key scheme: {}", s)),
        }
    }
}

/// Registry settings for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Enforce uniqueness and referential integrity. Trusted bulk runs may
    /// turn this off.
    pub strict: bool,

    pub scheme: KeyScheme,

    /// First synthetic sequence number per type
    pub sequence_start: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict: true,
            scheme: KeyScheme::Sequenced,
            sequence_start: DEFAULT_SEQUENCE_START,
        }
    }
}

/// End-of-run accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    /// Ids allocated per type key
    pub defined: BTreeMap<u32, usize>,
    pub written: usize,
    pub aliases: usize,
    pub aliases_applied: usize,
}

/// Run-scoped id allocator and reference checker
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    next_sequence: HashMap<TypeKey, u64>,
    key_map: HashMap<TypeKey, HashMap<NaturalKey, u64>>,
    /// Natural scheme only: who owns each local id (`None` = synthetic)
    owners: HashMap<TypeKey, HashMap<u64, Option<NaturalKey>>>,
    defined: HashMap<TypeKey, usize>,
    ids_written: HashSet<ItemId>,
    aliases: HashMap<ItemId, ItemId>,
    aliases_logged: HashSet<ItemId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        debug!(?config, "Creating item registry");
        Self {
            config,
            next_sequence: HashMap::new(),
            key_map: HashMap::new(),
            owners: HashMap::new(),
            defined: HashMap::new(),
            ids_written: HashSet::new(),
            aliases: HashMap::new(),
            aliases_logged: HashSet::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn is_strict(&self) -> bool {
        self.config.strict
    }

    /// Allocate the id for `(type_key, key)`.
    ///
    /// Without a natural key a fresh sequence number is always allocated.
    /// With one, a second definition is a [`RegistryError::DuplicateId`] in
    /// strict mode and returns the first id otherwise.
    pub fn define_id(
        &mut self,
        type_key: TypeKey,
        key: Option<NaturalKey>,
    ) -> Result<ItemId, RegistryError> {
        let Some(key) = key else {
            let local = self.next_local(type_key);
            self.claim_synthetic(type_key, local);
            *self.defined.entry(type_key).or_default() += 1;
            return Ok(self.resolve(ItemId::new(type_key, local)));
        };

        if let Some(local) = self.lookup(type_key, key) {
            let id = ItemId::new(type_key, local);
            if self.config.strict {
                return Err(RegistryError::DuplicateId { id });
            }
            return Ok(self.resolve(id));
        }

        let local = self.allocate(type_key, key)?;
        Ok(self.resolve(ItemId::new(type_key, local)))
    }

    /// Resolve the id previously defined for `(type_key, key)`.
    ///
    /// Strict mode fails with [`RegistryError::DanglingReference`] when the
    /// key was never defined or its record was never written. Lenient mode
    /// allocates on first reference.
    pub fn reference_id(
        &mut self,
        type_key: TypeKey,
        key: NaturalKey,
    ) -> Result<ItemId, RegistryError> {
        let local = match self.lookup(type_key, key) {
            Some(local) => local,
            None if self.config.strict => {
                return Err(RegistryError::DanglingReference {
                    type_key,
                    key,
                    reason: DanglingReason::NeverDefined,
                });
            },
            None => {
                trace!(%type_key, key, "Allocating id on first reference");
                self.allocate(type_key, key)?
            },
        };

        let id = self.resolve(ItemId::new(type_key, local));
        if self.config.strict && !self.ids_written.contains(&id) {
            return Err(RegistryError::DanglingReference {
                type_key,
                key,
                reason: DanglingReason::NeverWritten(id),
            });
        }
        Ok(id)
    }

    /// Mark an id as emitted. Call once per written record, after rendering
    /// succeeded. Returns the id actually recorded (after aliasing).
    pub fn record_written(&mut self, id: ItemId) -> Result<ItemId, RegistryError> {
        let id = self.resolve(id);
        if !self.ids_written.insert(id) && self.config.strict {
            return Err(RegistryError::DuplicateId { id });
        }
        Ok(id)
    }

    /// Make every later lookup of `dropped` answer `survivor`.
    ///
    /// Returns false (and changes nothing) for a self-alias, for an id that
    /// is already an alias of something else, and for an alias that would
    /// close a cycle.
    pub fn register_alias(&mut self, dropped: ItemId, survivor: ItemId) -> bool {
        if dropped == survivor {
            return false;
        }
        if let Some(existing) = self.aliases.get(&dropped).copied() {
            if existing == survivor {
                return true;
            }
            warn!(%dropped, %survivor, %existing, "Refusing to re-point an existing id alias");
            return false;
        }
        if self.chain(survivor).any(|id| id == dropped) {
            warn!(%dropped, %survivor, "Refusing id alias that would form a cycle");
            return false;
        }
        info!(%dropped, %survivor, "Registered id alias");
        self.aliases.insert(dropped, survivor);
        true
    }

    /// Follow the alias chain from `id`, logging the substitution the first
    /// time it is applied to `id`.
    pub fn resolve(&mut self, id: ItemId) -> ItemId {
        let target = self.peek(id);
        if target != id && self.aliases_logged.insert(id) {
            info!(from = %id, to = %target, "Mapped item id");
        }
        target
    }

    /// Follow the alias chain without logging
    pub fn peek(&self, id: ItemId) -> ItemId {
        self.chain(id).last().unwrap_or(id)
    }

    /// `id` followed by every id its alias chain passes through
    fn chain(&self, id: ItemId) -> impl Iterator<Item = ItemId> + '_ {
        // registration keeps the table acyclic; the bound is a backstop
        std::iter::successors(Some(id), |current| self.aliases.get(current).copied())
            .take(self.aliases.len() + 1)
    }

    pub fn is_written(&self, id: ItemId) -> bool {
        self.ids_written.contains(&self.peek(id))
    }

    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            defined: self
                .defined
                .iter()
                .map(|(type_key, n)| (type_key.0, *n))
                .collect(),
            written: self.ids_written.len(),
            aliases: self.aliases.len(),
            aliases_applied: self.aliases_logged.len(),
        }
    }

    fn lookup(&self, type_key: TypeKey, key: NaturalKey) -> Option<u64> {
        self.key_map.get(&type_key)?.get(&key).copied()
    }

    fn allocate(&mut self, type_key: TypeKey, key: NaturalKey) -> Result<u64, RegistryError> {
        let local = match self.config.scheme {
            KeyScheme::Sequenced => self.next_local(type_key),
            KeyScheme::Natural => self.claim_natural(type_key, key)?,
        };
        self.key_map.entry(type_key).or_default().insert(key, local);
        *self.defined.entry(type_key).or_default() += 1;
        Ok(local)
    }

    fn next_local(&mut self, type_key: TypeKey) -> u64 {
        let owners = self.owners.get(&type_key);
        let next = self
            .next_sequence
            .entry(type_key)
            .or_insert(self.config.sequence_start);
        loop {
            let local = *next;
            *next += 1;
            if !owners.is_some_and(|o| o.contains_key(&local)) {
                return local;
            }
        }
    }

    fn claim_synthetic(&mut self, type_key: TypeKey, local: u64) {
        if self.config.scheme == KeyScheme::Natural {
            self.owners.entry(type_key).or_default().insert(local, None);
        }
    }

    fn claim_natural(&mut self, type_key: TypeKey, key: NaturalKey) -> Result<u64, RegistryError> {
        let local = remap_natural_key(key);
        let owners = self.owners.entry(type_key).or_default();
        if let Some(owner) = owners.get(&local) {
            if *owner != Some(key) {
                return Err(RegistryError::DuplicateId {
                    id: ItemId::new(type_key, local),
                });
            }
        }
        owners.insert(local, Some(key));

        if key >= 0 {
            let next = self
                .next_sequence
                .entry(type_key)
                .or_insert(self.config.sequence_start);
            *next = (*next).max(local.saturating_add(1));
        }
        Ok(local)
    }
}
