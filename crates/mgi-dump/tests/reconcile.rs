//! End-to-end tests for the ontology reconcilers
//!
//! Inputs are small OBO and tab-delimited fixtures, parsed through the same
//! readers the commands use.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mgi_common::obo::{self, parse_str, Stanza};
use mgi_dump::crossmap::MappingTable;
use mgi_dump::names::{NameTable, TermColumn};
use mgi_dump::reconcile::anatomy::{read_structures, AnatomyMerger};
use mgi_dump::reconcile::remosh::remosh;
use mgi_dump::Namespaces;

const BASE: &str = "format-version: 1.2
default-namespace: ctd

[Term]
id: MESH:D1
name: Abnormalities
alt_id: OMIM:100
synonym: \"Prune belly\" EXACT [OMIM:100]

[Term]
id: MESH:D2
name: Aging
synonym: \"Senescence\" EXACT []

[Term]
id: MESH:D3
name: Ataxia

[Term]
id: OMIM:300
name: Old leaf
is_a: MESH:D3 ! Ataxia
";

const NAMES: &str = "100\tPrune belly syndrome\n\
200\tTwin disorder; TD\n\
300\tLeaf disorder\n";

fn table(rows: &[[&str; 7]]) -> MappingTable {
    let text: String = rows.iter().map(|r| r.join("\t") + "\n").collect();
    MappingTable::from_reader(text.as_bytes(), &Namespaces::default()).unwrap()
}

fn names() -> NameTable {
    NameTable::from_reader_as(NAMES.as_bytes(), "OMIM", TermColumn::Full).unwrap()
}

fn find<'a>(stanzas: &'a [Stanza], id: &str) -> &'a Stanza {
    stanzas
        .iter()
        .find(|s| s.id() == Some(id))
        .unwrap_or_else(|| panic!("no stanza {}", id))
}

#[test]
fn merge_demoted_to_leaf() {
    let mappings = table(&[["Abnormalities", "D1", "M", "L", "Prune belly", "100", "1"]]);
    let (stanzas, report) = remosh(parse_str(BASE).unwrap(), &mappings.rows, &names(), &Namespaces::default());

    let d1 = find(&stanzas, "MESH:D1");
    assert_eq!(d1.alt_ids().count(), 0);
    assert_eq!(d1.values("synonym").count(), 0);

    let leaf = find(&stanzas, "OMIM:100");
    assert_eq!(leaf.name(), Some("Prune belly syndrome"));
    assert_eq!(leaf.parents().collect::<Vec<_>>(), vec!["MESH:D1"]);
    assert_eq!(leaf.first("is_a"), Some("MESH:D1 ! Abnormalities"));
    assert_eq!(report.leaves, 1);
    assert_eq!(report.merged, 0);
}

#[test]
fn conflicting_merges_become_one_leaf_with_two_parents() {
    let mappings = table(&[
        ["Abnormalities", "D1", "M", "M", "Twin", "200", "1"],
        ["Aging", "D2", "M", "M", "Twin", "200", "1"],
    ]);
    let (stanzas, report) = remosh(parse_str(BASE).unwrap(), &mappings.rows, &names(), &Namespaces::default());

    let leaves: Vec<&Stanza> = stanzas.iter().filter(|s| s.id() == Some("OMIM:200")).collect();
    assert_eq!(leaves.len(), 1);
    let is_a: Vec<&str> = leaves[0].values("is_a").collect();
    assert_eq!(is_a, vec!["MESH:D1 ! Abnormalities", "MESH:D2 ! Aging"]);

    for target in ["MESH:D1", "MESH:D2"] {
        assert!(find(&stanzas, target).alt_ids().all(|alt| alt != "OMIM:200"));
    }

    assert_eq!(report.leafified.len(), 1);
    assert_eq!(report.leafified[0].external_id, "OMIM:200");
    assert_eq!(report.leafified[0].claims.len(), 2);
    assert!(obo::check_consistency(&stanzas).is_clean());
}

#[test]
fn merge_adds_alt_id_and_exact_synonym() {
    let mappings = table(&[["Aging", "D2", "M", "M", "Twin", "200", "1"]]);
    let (stanzas, report) = remosh(parse_str(BASE).unwrap(), &mappings.rows, &names(), &Namespaces::default());

    let d2 = find(&stanzas, "MESH:D2");
    assert_eq!(d2.alt_ids().collect::<Vec<_>>(), vec!["OMIM:200"]);
    let synonyms: Vec<&str> = d2.values("synonym").collect();
    // the whole export term is the name, `;` and all
    assert_eq!(synonyms, vec!["\"Senescence\" EXACT []", "\"Twin disorder; TD\" EXACT [OMIM:200]"]);
    assert_eq!(report.merged, 1);
    assert!(stanzas.iter().all(|s| s.id() != Some("OMIM:200")));
}

#[test]
fn untouched_stanzas_pass_through() {
    let mappings = table(&[["Aging", "D2", "M", "M", "Twin", "200", "1"]]);
    let input = parse_str(BASE).unwrap();
    let header = input[0].clone();
    let ataxia = find(&input, "MESH:D3").clone();

    let (stanzas, report) = remosh(input, &mappings.rows, &names(), &Namespaces::default());
    assert_eq!(stanzas[0], header);
    assert_eq!(find(&stanzas, "MESH:D3"), &ataxia);

    // the old external leaf has no row, so it is dropped and reported
    assert!(stanzas.iter().all(|s| s.id() != Some("OMIM:300")));
    assert_eq!(report.authority_not_in_table, vec!["OMIM:100", "OMIM:300"]);
    assert!(report.internal_not_in_table.contains(&"MESH:D3".to_string()));
}

#[test]
fn remosh_is_deterministic() {
    let mappings = table(&[
        ["Abnormalities", "D1", "M", "M", "Twin", "200", "1"],
        ["Aging", "D2", "M", "M", "Twin", "200", "1"],
        ["Ataxia", "D3", "L", "L", "Leaf", "300", "1"],
        ["Abnormalities", "D1", "M", "M", "Prune", "100", "1"],
    ]);
    let run = || {
        let (stanzas, _) = remosh(parse_str(BASE).unwrap(), &mappings.rows, &names(), &Namespaces::default());
        obo::to_string(&stanzas)
    };
    let first = run();
    assert_eq!(first, run());

    // feeding the output back in changes nothing
    let again = remosh(parse_str(&first).unwrap(), &mappings.rows, &names(), &Namespaces::default()).0;
    assert_eq!(obo::to_string(&again), first);
}

#[test]
fn malformed_mapping_rows_are_skipped() {
    let text = "Aging\tD2\tM\tM\tTwin\t200\t1\n\
                too\tfew\tcolumns\n\
                Aging\tD2\tM\tM\tTwin\tOMIM:200\t1\n\
                Aging\tD2\tM\tM\tTwin\t\t1\n";
    let mappings = MappingTable::from_reader(text.as_bytes(), &Namespaces::default()).unwrap();
    assert_eq!(mappings.rows.len(), 1);
    assert_eq!(mappings.skipped, 3);
}

const EMAP: &str = "format-version: 1.2

[Term]
id: EMAP:0
name: stage specific anatomical structure

[Term]
id: EMAP:10
name: TS07 embryo
relationship: part_of EMAP:0 ! stage specific anatomical structure

[Term]
id: EMAP:11
name: TS07 heart
relationship: part_of EMAP:10 ! TS07 embryo
";

const MA: &str = "format-version: 1.2
default-namespace: adult_mouse_anatomy

[Term]
id: MA:0000001
name: mouse anatomy

[Term]
id: MA:0000002
name: spleen
is_a: MA:0000001 ! mouse anatomy
";

const GXD: &str = "mgi_id\tedinburgh_key\tma_id\tprint_name\tstage\tparent_name\tparent_edinburgh\tparent_mgi\tparent_ma
MGI:1\tEMAP:10\t\tembryo\t7\t\t\t\t
MGI:2\t\t\theart\t7\tembryo\t\tMGI:1\t
MGI:3\t\tMA:0000002\tspleen\t28\t\t\t\t
MGI:4\t\t\tvalve\t7\theart\t\tMGI:2\t
";

#[test]
fn anatomy_merge_places_every_structure() {
    let structures = read_structures(GXD.as_bytes()).unwrap();
    assert_eq!(structures.len(), 4);
    assert_eq!(structures[1].parent_mgi.as_deref(), Some("MGI:1"));
    assert_eq!(structures[0].ma_id, None);

    let merger = AnatomyMerger::with_default_tables().unwrap();
    let (stanzas, report) = merger.merge(parse_str(EMAP).unwrap(), parse_str(MA).unwrap(), &structures);

    assert!(stanzas[0].is_header());
    assert_eq!(report.matched_by_id, 2);
    assert_eq!(report.matched_by_name, 1);
    assert_eq!(report.mapped_to_ma, 1);
    assert_eq!(report.new_terms, 1);

    // new terms come before the existing ones
    assert_eq!(stanzas[1].id(), Some("MGI:4"));
    assert_eq!(stanzas[1].name(), Some("TS07 valve"));
    // MGI:2 was absorbed by EMAP:11, so the new term's parent follows it
    assert_eq!(stanzas[1].first("relationship"), Some("part_of EMAP:11 ! TS07 heart"));

    let embryo = find(&stanzas, "EMAP:10");
    assert_eq!(embryo.alt_ids().collect::<Vec<_>>(), vec!["MGI:1"]);
    let heart = find(&stanzas, "EMAP:11");
    assert_eq!(heart.alt_ids().collect::<Vec<_>>(), vec!["MGI:2"]);

    let spleen = find(&stanzas, "MA:0000002");
    assert_eq!(spleen.name(), Some("TS28 spleen"));
    assert_eq!(spleen.first("is_a"), Some("EMAP:0 ! stage specific anatomical structure"));
    assert_eq!(spleen.alt_ids().collect::<Vec<_>>(), vec!["MGI:3"]);
    assert!(find(&stanzas, "MA:0000001").is_obsolete());

    // the MA header is not carried over
    assert_eq!(stanzas.iter().filter(|s| s.is_header()).count(), 1);
}
