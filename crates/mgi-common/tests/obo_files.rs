//! OBO reader/writer behaviour on files

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mgi_common::obo::{self, Stanza, StanzaKind, TagValue};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

const CTD: &str = "format-version: 1.2
default-namespace: ctd

[Term]
id: MESH:D000001
name: Calcimycin
alt_id: OMIM:100100
synonym: \"Prune belly\" EXACT [OMIM:100100]
is_a: MESH:D000002 ! Root
[Term]
id: MESH:D000002
name: Root


[Typedef]
id: part_of
";

#[test]
fn file_is_normalised_once_then_stable() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.obo");
    let second = dir.path().join("second.obo");

    fs::write(&first, CTD).unwrap();
    let stanzas = obo::read_file(&first).unwrap();
    assert_eq!(stanzas.len(), 4);

    obo::write_file(&second, &stanzas).unwrap();
    let written = fs::read_to_string(&second).unwrap();
    assert!(written.contains("is_a: MESH:D000002 ! Root\n\n[Term]\nid: MESH:D000002\n"));
    assert!(written.ends_with("id: part_of\n\n"));

    obo::write_file(&first, &obo::read_file(&second).unwrap()).unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), written);
}

#[test]
fn consistency_reports_identity_problems() {
    let stanzas = vec![
        Stanza::term("MESH:D1", "a").with("alt_id", "OMIM:1"),
        Stanza::term("MESH:D2", "b").with("alt_id", "OMIM:1").with("is_a", "MESH:D9 ! gone"),
        Stanza::term("MESH:D2", "c"),
    ];
    let consistency = obo::check_consistency(&stanzas);
    assert_eq!(consistency.duplicate_ids, vec!["MESH:D2"]);
    assert_eq!(consistency.shared_alt_ids, vec!["OMIM:1"]);
    assert_eq!(
        consistency.dangling_parents,
        vec![("MESH:D2".to_string(), "MESH:D9".to_string())]
    );
}

fn tag_value() -> impl Strategy<Value = TagValue> {
    (
        prop::sample::select(vec!["id", "name", "alt_id", "is_a", "synonym", "def"]),
        "[A-Za-z0-9][A-Za-z0-9 :!\"\\[\\]._-]{0,30}",
    )
        .prop_map(|(tag, value)| TagValue::new(tag, value.trim_end()))
}

fn stanza() -> impl Strategy<Value = Stanza> {
    (
        prop::sample::select(vec![StanzaKind::Term, StanzaKind::Typedef]),
        prop::collection::vec(tag_value(), 1..8),
    )
        .prop_map(|(kind, lines)| Stanza { kind, lines })
}

proptest! {
    #[test]
    fn written_stanzas_read_back_unchanged(stanzas in prop::collection::vec(stanza(), 0..6)) {
        let text = obo::to_string(&stanzas);
        prop_assert_eq!(obo::parse_str(&text).unwrap(), stanzas);
    }
}
