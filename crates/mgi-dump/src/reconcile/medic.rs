//! Disease vocabulary conflation
//!
//! Takes a disease ontology whose primary ids are mostly internal (`MESH:`)
//! and aligns it with the authoritative external (`OMIM:`) vocabulary:
//!
//! 1. the header namespace becomes [`MEDIC_NAMESPACE`]
//! 2. authoritative ids missing from the file are added as root terms
//! 3. a term with an internal primary id and exactly one external `alt_id`
//!    swaps the two
//! 4. names are replaced by authoritative names; a displaced name that is not
//!    a prefix of the new one survives as a synonym
//! 5. authoritative synonyms are attached to every id and alt_id
//! 6. bare forms of prefixed ids are added as `alt_id`s
//! 7. `is_a` lines pointing at a swapped id follow the swap

use crate::config::{strip_prefix, Namespaces};
use crate::names::NameSource;
use crate::reconcile::{known_ids, synonym_value};
use mgi_common::obo::{ref_target, Stanza};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub const MEDIC_NAMESPACE: &str = "MEDIC_disease_ontology";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedicReport {
    pub added_terms: Vec<String>,
    /// `(old primary, new primary)`
    pub swapped: Vec<(String, String)>,
    pub renamed: usize,
    pub synonyms_added: usize,
    pub alt_ids_added: usize,
    pub is_a_rewritten: usize,
}

/// Append a root term for every authoritative external id the file lacks.
/// Returns the added ids, sorted.
pub fn add_missing_terms(
    stanzas: &mut Vec<Stanza>,
    names: &dyn NameSource,
    namespaces: &Namespaces,
) -> Vec<String> {
    let present = known_ids(stanzas);
    let mut added = Vec::new();
    for id in names.ids() {
        if !namespaces.is_external(id) || present.contains(id) {
            continue;
        }
        stanzas.push(Stanza::term(id, names.name(id).unwrap_or_default()));
        added.push(id.to_string());
    }
    info!(added = added.len(), "Added missing external terms");
    added
}

pub fn conflate(
    mut stanzas: Vec<Stanza>,
    names: &dyn NameSource,
    namespaces: &Namespaces,
) -> (Vec<Stanza>, MedicReport) {
    let mut report = MedicReport::default();

    for stanza in stanzas.iter_mut().filter(|s| s.is_header()) {
        if stanza.first("default-namespace").is_some() {
            stanza.set_first("default-namespace", MEDIC_NAMESPACE);
        }
    }

    report.added_terms = add_missing_terms(&mut stanzas, names, namespaces);

    let swapped = swap_primary_ids(&mut stanzas, namespaces);
    report.swapped = swapped.iter().map(|(a, b)| (a.clone(), b.clone())).collect();

    let mut displaced: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for stanza in stanzas.iter_mut().filter(|s| s.is_term()) {
        let (Some(id), Some(old)) = (stanza.id(), stanza.name()) else {
            continue;
        };
        let Some(new) = names.name(id) else {
            continue;
        };
        if old == new {
            continue;
        }
        let id = id.to_string();
        let old = old.to_string();
        if !new.to_lowercase().starts_with(&old.to_lowercase()) {
            displaced.entry(id.clone()).or_default().insert(old.clone());
        }
        debug!(id = %id, old = %old, new = %new, "Replacing term name");
        stanza.set_first("name", new);
        report.renamed += 1;
    }

    for stanza in stanzas.iter_mut().filter(|s| s.is_term()) {
        let mut synonyms: Vec<String> = Vec::new();
        for line in stanza.lines.iter().filter(|l| l.tag == "id" || l.tag == "alt_id") {
            let mut texts: BTreeSet<&str> = names.synonyms(&line.value).into_iter().collect();
            if let Some(old_names) = displaced.get(&line.value) {
                texts.extend(old_names.iter().map(String::as_str));
            }
            synonyms.extend(texts.into_iter().map(|t| synonym_value(t, None, &[])));
        }
        report.synonyms_added += synonyms.len();
        for synonym in synonyms {
            stanza.push("synonym", synonym);
        }
    }

    for stanza in stanzas.iter_mut().filter(|s| s.is_term()) {
        let mut bare: Vec<String> = Vec::new();
        let mut existing: BTreeSet<String> = BTreeSet::new();
        for line in &stanza.lines {
            match line.tag.as_str() {
                "id" if namespaces.is_internal(&line.value) || namespaces.is_external(&line.value) => {
                    bare.push(strip_prefix(&line.value).to_string());
                },
                "alt_id" if line.value.contains(':') => bare.push(strip_prefix(&line.value).to_string()),
                "alt_id" => {
                    existing.insert(line.value.clone());
                },
                _ => {},
            }
        }
        for id in bare {
            if existing.insert(id.clone()) {
                stanza.push("alt_id", id);
                report.alt_ids_added += 1;
            }
        }
    }

    for stanza in stanzas.iter_mut().filter(|s| s.is_term()) {
        for line in stanza.lines.iter_mut().filter(|l| l.tag == "is_a") {
            let target = ref_target(&line.value);
            let Some(replacement) = swapped.get(target) else {
                continue;
            };
            let rest = line.value[target.len()..].trim_start();
            line.value = if rest.is_empty() {
                replacement.clone()
            } else {
                format!("{} {}", replacement, rest)
            };
            report.is_a_rewritten += 1;
        }
    }

    info!(
        added = report.added_terms.len(),
        swapped = report.swapped.len(),
        renamed = report.renamed,
        synonyms = report.synonyms_added,
        alt_ids = report.alt_ids_added,
        is_a_rewritten = report.is_a_rewritten,
        "Conflated disease ontology"
    );
    (stanzas, report)
}

/// Swap an internal primary id with the term's only external alt_id.
/// Returns old primary -> new primary.
fn swap_primary_ids(stanzas: &mut [Stanza], namespaces: &Namespaces) -> BTreeMap<String, String> {
    let mut swapped = BTreeMap::new();
    for stanza in stanzas.iter_mut().filter(|s| s.is_term()) {
        let primary = stanza
            .lines
            .iter()
            .position(|l| l.tag == "id" && namespaces.is_internal(&l.value));
        let mut external = stanza
            .lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.tag == "alt_id" && namespaces.is_external(&l.value))
            .map(|(i, _)| i);

        let (Some(primary), Some(alt), None) = (primary, external.next(), external.next()) else {
            continue;
        };

        stanza.lines[primary].tag = "alt_id".to_string();
        stanza.lines[alt].tag = "id".to_string();
        stanza.lines.swap(primary, alt);
        swapped.insert(
            stanza.lines[alt].value.clone(),
            stanza.lines[primary].value.clone(),
        );
    }
    swapped
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::names::NameTable;
    use mgi_common::obo::parse_str;

    const MEDIC: &str = "format-version: 1.2
default-namespace: ctd

[Term]
id: MESH:D1
name: Prune belly
alt_id: OMIM:100100

[Term]
id: MESH:D2
name: Aging
alt_id: OMIM:1
alt_id: OMIM:2
is_a: MESH:D1 ! Prune belly
";

    fn names() -> NameTable {
        let mut names = NameTable::new();
        names.insert_term("OMIM:100100", "Prune belly syndrome; PBS");
        names.insert("OMIM:1", "one");
        names.insert("OMIM:2", "two");
        names.insert("OMIM:3", "three");
        names
    }

    #[test]
    fn test_swap_only_with_single_external_alt() {
        let mut stanzas = parse_str(MEDIC).unwrap();
        let swapped = swap_primary_ids(&mut stanzas, &Namespaces::default());
        assert_eq!(swapped.get("MESH:D1").map(String::as_str), Some("OMIM:100100"));
        assert!(!swapped.contains_key("MESH:D2"));
        assert_eq!(stanzas[1].id(), Some("OMIM:100100"));
        assert_eq!(stanzas[1].lines[0].tag, "id");
        assert_eq!(stanzas[1].alt_ids().collect::<Vec<_>>(), vec!["MESH:D1"]);
    }

    #[test]
    fn test_conflate() {
        let (stanzas, report) = conflate(parse_str(MEDIC).unwrap(), &names(), &Namespaces::default());

        assert_eq!(stanzas[0].first("default-namespace"), Some(MEDIC_NAMESPACE));
        assert_eq!(report.added_terms, vec!["OMIM:3".to_string()]);

        let swapped = &stanzas[1];
        assert_eq!(swapped.id(), Some("OMIM:100100"));
        assert_eq!(swapped.name(), Some("Prune belly syndrome"));
        // "Prune belly" is a prefix of the new name, so it is not kept
        let synonyms: Vec<&str> = swapped.values("synonym").collect();
        assert_eq!(synonyms, vec!["\"PBS\" []"]);
        let alts: Vec<&str> = swapped.alt_ids().collect();
        assert_eq!(alts, vec!["MESH:D1", "100100", "D1"]);

        let aging = &stanzas[2];
        assert_eq!(aging.id(), Some("MESH:D2"));
        assert_eq!(aging.first("is_a"), Some("OMIM:100100 ! Prune belly"));
        assert_eq!(report.is_a_rewritten, 1);

        let added = &stanzas[3];
        assert_eq!(added.id(), Some("OMIM:3"));
        assert_eq!(added.name(), Some("three"));
    }

    #[test]
    fn test_displaced_name_becomes_synonym() {
        let stanzas = vec![Stanza::term("OMIM:1", "Old name")];
        let (stanzas, report) = conflate(stanzas, &names(), &Namespaces::default());
        assert_eq!(report.renamed, 1);
        assert_eq!(stanzas[0].name(), Some("one"));
        assert!(stanzas[0].values("synonym").any(|s| s == "\"Old name\" []"));
    }

    #[test]
    fn test_add_missing_terms_respects_alt_ids() {
        let mut stanzas = vec![Stanza::term("MESH:D9", "x").with("alt_id", "OMIM:1")];
        let added = add_missing_terms(&mut stanzas, &names(), &Namespaces::default());
        assert_eq!(added, vec!["OMIM:100100", "OMIM:2", "OMIM:3"]);
        assert_eq!(stanzas.len(), 4);
    }
}
