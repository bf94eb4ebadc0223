//! Merge/leaf remapping between an internal and an external vocabulary
//!
//! The base ontology encodes one set of merge decisions: external ids folded
//! into internal terms as `alt_id`s, or standing alone as child terms. The
//! cross-mapping table encodes the decisions we want. The remapper strips the
//! external namespace out of the base file and rebuilds it from the table:
//!
//! - `Merge` rows become an `alt_id` plus an `EXACT` synonym on the target
//! - `Leaf` rows become a term of their own with one `is_a` per target
//!
//! An external id merged into more than one target cannot be an alternate id
//! of both. All of its claims are downgraded to `Leaf` and the id is reported
//! as leaf-ified.
//!
//! Names for external ids always come from the [`NameSource`]; the base file
//! and then the table are fallbacks, and every fallback is reported.

use crate::config::Namespaces;
use crate::crossmap::{Action, CrossMapping};
use crate::names::NameSource;
use crate::reconcile::{report_set, synonym_value, synonym_xrefs};
use mgi_common::obo::{Stanza, TagValue};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// What happens to one external id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Alternate id of this target
    Merge(String),
    /// Child term of these targets, in table order
    Leaf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub target_id: String,
    pub source_action: Action,
    pub desired_action: Action,
}

/// An external id whose conflicting merges were downgraded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafifiedId {
    pub external_id: String,
    pub claims: Vec<Claim>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoshReport {
    pub mapping_rows: usize,
    /// `alt_id`s written onto internal terms
    pub merged: usize,
    /// Leaf terms written
    pub leaves: usize,
    pub leafified: Vec<LeafifiedId>,
    /// Merges whose target is not in the base file; written as root terms
    pub orphan_merges: Vec<String>,
    /// External ids named from the base file or the table
    pub fallback_names: Vec<String>,
    pub internal_not_in_table: Vec<String>,
    pub table_internal_not_in_base: Vec<String>,
    pub table_external_not_in_authority: Vec<String>,
    pub authority_not_in_table: Vec<String>,
}

/// Decide one external id from all of its rows.
///
/// Returns the leaf-ified record alongside when the rows merge the id into
/// more than one target.
pub fn decide(external_id: &str, rows: &[&CrossMapping]) -> (Decision, Option<LeafifiedId>) {
    let mut targets: Vec<String> = Vec::new();
    for row in rows {
        if !targets.contains(&row.target_id) {
            targets.push(row.target_id.clone());
        }
    }
    let any_merge = rows.iter().any(|r| r.desired_action == Action::Merge);

    match (any_merge, targets.as_slice()) {
        (true, [target]) => (Decision::Merge(target.clone()), None),
        (true, _) => {
            let leafified = LeafifiedId {
                external_id: external_id.to_string(),
                claims: rows
                    .iter()
                    .map(|r| Claim {
                        target_id: r.target_id.clone(),
                        source_action: r.source_action,
                        desired_action: r.desired_action,
                    })
                    .collect(),
            };
            (Decision::Leaf(targets), Some(leafified))
        },
        (false, _) => (Decision::Leaf(targets), None),
    }
}

/// Rebuild the external namespace of `base` from `mappings`
pub fn remosh(
    base: Vec<Stanza>,
    mappings: &[CrossMapping],
    names: &dyn NameSource,
    namespaces: &Namespaces,
) -> (Vec<Stanza>, RemoshReport) {
    let mut report = RemoshReport {
        mapping_rows: mappings.len(),
        ..RemoshReport::default()
    };

    let mut rows_by_external: BTreeMap<&str, Vec<&CrossMapping>> = BTreeMap::new();
    for row in mappings {
        rows_by_external.entry(row.external_id.as_str()).or_default().push(row);
    }

    let mut decisions: BTreeMap<&str, Decision> = BTreeMap::new();
    for (external_id, rows) in &rows_by_external {
        let (decision, leafified) = decide(external_id, rows);
        if let Some(leafified) = leafified {
            warn!(
                external_id = %external_id,
                claims = ?leafified.claims,
                "Multiple merge not supported, id leaf-ified"
            );
            report.leafified.push(leafified);
        }
        decisions.insert(*external_id, decision);
    }

    let mut merges_by_target: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (external_id, decision) in &decisions {
        if let Decision::Merge(target) = decision {
            merges_by_target.entry(target.as_str()).or_default().push(*external_id);
        }
    }

    // names of everything in the base file, first occurrence wins
    let mut base_names: BTreeMap<String, String> = BTreeMap::new();
    let mut internal_ids: BTreeSet<String> = BTreeSet::new();
    for stanza in base.iter().filter(|s| s.is_term()) {
        if let (Some(id), Some(name)) = (stanza.id(), stanza.name()) {
            base_names.entry(id.to_string()).or_insert_with(|| name.to_string());
        }
        if let Some(id) = stanza.id().filter(|id| namespaces.is_internal(id)) {
            internal_ids.insert(id.to_string());
        }
    }

    let mut namer = Namer {
        names,
        base_names: &base_names,
        rows_by_external: &rows_by_external,
        fallbacks: Vec::new(),
    };

    let mut output = Vec::with_capacity(base.len());
    for mut stanza in base {
        if !stanza.is_term() {
            output.push(stanza);
            continue;
        }
        let id = stanza.id().unwrap_or_default().to_string();
        if namespaces.is_external(&id) {
            // rebuilt from the table below
            continue;
        }
        if namespaces.is_internal(&id) {
            stanza.retain(|line| !belongs_to_external(line, namespaces));
            for external_id in merges_by_target.get(id.as_str()).into_iter().flatten() {
                let name = namer.name(external_id);
                stanza.push("alt_id", *external_id);
                stanza.push("synonym", synonym_value(&name, Some("EXACT"), &[*external_id]));
                report.merged += 1;
            }
        }
        output.push(stanza);
    }

    let mut new_terms: BTreeMap<&str, Stanza> = BTreeMap::new();

    for (target, external_ids) in &merges_by_target {
        if internal_ids.contains(*target) {
            continue;
        }
        for external_id in external_ids {
            warn!(
                external_id = %external_id,
                target_id = %target,
                "Merge target not in base ontology, writing id as a root term"
            );
            report.orphan_merges.push(external_id.to_string());
            new_terms.insert(*external_id, Stanza::term(*external_id, namer.name(external_id)));
        }
    }

    for (external_id, decision) in &decisions {
        let Decision::Leaf(parents) = decision else {
            continue;
        };
        let mut term = Stanza::term(*external_id, namer.name(external_id));
        for parent in parents {
            let parent_name = base_names
                .get(parent)
                .map(String::as_str)
                .or_else(|| target_name_from_table(&rows_by_external, external_id, parent))
                .unwrap_or_default();
            term.push("is_a", format!("{} ! {}", parent, parent_name));
        }
        report.leaves += 1;
        new_terms.insert(*external_id, term);
    }

    output.extend(new_terms.into_values());

    let table_internal: BTreeSet<&str> = mappings.iter().map(|r| r.target_id.as_str()).collect();
    let table_external: BTreeSet<&str> = rows_by_external.keys().copied().collect();
    let authority: BTreeSet<&str> = names
        .ids()
        .into_iter()
        .filter(|id| namespaces.is_external(id))
        .collect();

    report.internal_not_in_table = internal_ids
        .iter()
        .filter(|id| !table_internal.contains(id.as_str()))
        .cloned()
        .collect();
    report.table_internal_not_in_base = table_internal
        .iter()
        .filter(|id| !internal_ids.contains(**id))
        .map(|id| id.to_string())
        .collect();
    report.table_external_not_in_authority = table_external
        .difference(&authority)
        .map(|id| id.to_string())
        .collect();
    report.authority_not_in_table = authority
        .difference(&table_external)
        .map(|id| id.to_string())
        .collect();
    report.fallback_names = namer.fallbacks;

    report_set("Internal id from base ontology has no mapping", &report.internal_not_in_table);
    report_set("Internal id from mapping table not found in base ontology", &report.table_internal_not_in_base);
    report_set("External id from mapping table not found in name source", &report.table_external_not_in_authority);
    report_set("External id from name source has no mapping", &report.authority_not_in_table);
    info!(
        merged = report.merged,
        leaves = report.leaves,
        leafified = report.leafified.len(),
        orphan_merges = report.orphan_merges.len(),
        fallback_names = report.fallback_names.len(),
        "Remapped external ids"
    );

    (output, report)
}

/// True for `alt_id`s and synonyms that belong to the external namespace.
/// A synonym belongs to it only through an external xref; synonyms without
/// one stay on the internal term.
fn belongs_to_external(line: &TagValue, namespaces: &Namespaces) -> bool {
    match line.tag.as_str() {
        "alt_id" => namespaces.is_external(&line.value),
        "synonym" => synonym_xrefs(&line.value)
            .iter()
            .any(|xref| namespaces.is_external(xref)),
        _ => false,
    }
}

fn target_name_from_table<'a>(
    rows_by_external: &BTreeMap<&str, Vec<&'a CrossMapping>>,
    external_id: &str,
    target_id: &str,
) -> Option<&'a str> {
    rows_by_external
        .get(external_id)?
        .iter()
        .find(|r| r.target_id == target_id && !r.target_name.is_empty())
        .map(|r| r.target_name.as_str())
}

/// Name lookup for external ids with fallback accounting
struct Namer<'a> {
    names: &'a dyn NameSource,
    base_names: &'a BTreeMap<String, String>,
    rows_by_external: &'a BTreeMap<&'a str, Vec<&'a CrossMapping>>,
    fallbacks: Vec<String>,
}

impl Namer<'_> {
    fn name(&mut self, external_id: &str) -> String {
        if let Some(name) = self.names.name(external_id) {
            return name.to_string();
        }

        let fallback = self
            .base_names
            .get(external_id)
            .cloned()
            .or_else(|| {
                self.rows_by_external
                    .get(external_id)?
                    .iter()
                    .map(|r| r.external_name.as_str())
                    .find(|n| !n.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        warn!(
            external_id = %external_id,
            fallback = %fallback,
            "No authoritative name, using fallback"
        );
        self.fallbacks.push(external_id.to_string());
        fallback
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::names::NameTable;

    fn row(target: &str, external: &str, desired: Action) -> CrossMapping {
        CrossMapping {
            external_id: external.to_string(),
            target_id: target.to_string(),
            source_action: Action::Merge,
            desired_action: desired,
            external_name: String::new(),
            target_name: String::new(),
            external_type_code: "#".to_string(),
        }
    }

    #[test]
    fn test_names_fall_back_to_base_then_table() {
        let base = mgi_common::obo::parse_str(
            "[Term]\nid: MESH:D1\nname: Abnormalities\n\n\
             [Term]\nid: OMIM:500\nname: Base name\nis_a: MESH:D1 ! Abnormalities\n",
        )
        .unwrap();
        let mut from_base = row("MESH:D1", "OMIM:500", Action::Leaf);
        from_base.external_name = "Table name".to_string();
        let mut from_table = row("MESH:D1", "OMIM:600", Action::Leaf);
        from_table.external_name = "Other table name".to_string();
        let authoritative = row("MESH:D1", "OMIM:700", Action::Merge);
        let names: NameTable = vec![("OMIM:700", "Authority name")].into_iter().collect();

        let (stanzas, report) = remosh(
            base,
            &[from_base, from_table, authoritative],
            &names,
            &Namespaces::default(),
        );
        let find = |id: &str| stanzas.iter().find(|s| s.id() == Some(id)).unwrap().clone();

        assert_eq!(find("OMIM:500").name(), Some("Base name"));
        assert_eq!(find("OMIM:600").name(), Some("Other table name"));
        let d1 = find("MESH:D1");
        assert_eq!(d1.first("synonym"), Some("\"Authority name\" EXACT [OMIM:700]"));
        assert_eq!(report.fallback_names, vec!["OMIM:500", "OMIM:600"]);
    }

    #[test]
    fn test_single_merge() {
        let a = row("MESH:D1", "OMIM:1", Action::Merge);
        let (decision, leafified) = decide("OMIM:1", &[&a]);
        assert_eq!(decision, Decision::Merge("MESH:D1".to_string()));
        assert!(leafified.is_none());
    }

    #[test]
    fn test_conflicting_merges_are_leafified() {
        let a = row("MESH:D1", "OMIM:1", Action::Merge);
        let b = row("MESH:D2", "OMIM:1", Action::Merge);
        let (decision, leafified) = decide("OMIM:1", &[&a, &b]);
        assert_eq!(
            decision,
            Decision::Leaf(vec!["MESH:D1".to_string(), "MESH:D2".to_string()])
        );
        let leafified = leafified.unwrap();
        assert_eq!(leafified.claims.len(), 2);
        assert_eq!(leafified.claims[1].target_id, "MESH:D2");
    }

    #[test]
    fn test_merge_mixed_with_leaf_elsewhere_is_leafified() {
        let a = row("MESH:D1", "OMIM:1", Action::Merge);
        let b = row("MESH:D2", "OMIM:1", Action::Leaf);
        let (decision, leafified) = decide("OMIM:1", &[&a, &b]);
        assert!(matches!(decision, Decision::Leaf(ref p) if p.len() == 2));
        assert!(leafified.is_some());
    }

    #[test]
    fn test_repeated_rows_for_one_target() {
        let a = row("MESH:D1", "OMIM:1", Action::Merge);
        let (decision, leafified) = decide("OMIM:1", &[&a, &a]);
        assert_eq!(decision, Decision::Merge("MESH:D1".to_string()));
        assert!(leafified.is_none());

        let l = row("MESH:D1", "OMIM:1", Action::Leaf);
        let (decision, _) = decide("OMIM:1", &[&l, &l]);
        assert_eq!(decision, Decision::Leaf(vec!["MESH:D1".to_string()]));
    }

    #[test]
    fn test_external_lines_are_recognised() {
        let ns = Namespaces::default();
        assert!(belongs_to_external(&TagValue::new("alt_id", "OMIM:1"), &ns));
        assert!(!belongs_to_external(&TagValue::new("alt_id", "MESH:D2"), &ns));
        assert!(belongs_to_external(
            &TagValue::new("synonym", "\"x\" EXACT [OMIM:1]"),
            &ns
        ));
        assert!(!belongs_to_external(
            &TagValue::new("synonym", "\"x\" EXACT []"),
            &ns
        ));
        assert!(!belongs_to_external(&TagValue::new("is_a", "OMIM:1"), &ns));
    }
}
