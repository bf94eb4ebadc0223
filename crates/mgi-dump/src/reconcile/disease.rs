//! Disease ontology filter
//!
//! Keeps the header and the live `DOID:` terms of a disease ontology release.
//! `xref` lines become `alt_id` lines, and every external (`OMIM:`) value also
//! gets its bare accession as an extra `alt_id`.

use crate::config::{has_prefix, strip_prefix, Namespaces};
use mgi_common::obo::Stanza;
use serde::Serialize;
use tracing::info;

pub const DOID_PREFIX: &str = "DOID";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiseaseFilterReport {
    pub kept: usize,
    pub dropped_obsolete: usize,
    pub dropped_other: usize,
    pub xrefs_renamed: usize,
    pub bare_alt_ids_added: usize,
}

pub fn filter_disease_ontology(
    stanzas: Vec<Stanza>,
    namespaces: &Namespaces,
) -> (Vec<Stanza>, DiseaseFilterReport) {
    let mut report = DiseaseFilterReport::default();
    let mut output = Vec::new();

    for mut stanza in stanzas {
        if stanza.is_header() {
            output.push(stanza);
            continue;
        }
        let is_doid = stanza
            .id()
            .is_some_and(|id| has_prefix(id, DOID_PREFIX));
        if !is_doid {
            report.dropped_other += 1;
            continue;
        }
        if stanza.is_obsolete() {
            report.dropped_obsolete += 1;
            continue;
        }

        let mut bare = Vec::new();
        for line in stanza.lines.iter_mut() {
            if line.tag == "xref" {
                line.tag = "alt_id".to_string();
                report.xrefs_renamed += 1;
            }
            if line.tag != "id" && namespaces.is_external(&line.value) {
                bare.push(strip_prefix(&line.value).to_string());
            }
        }
        report.bare_alt_ids_added += bare.len();
        for accession in bare {
            stanza.push("alt_id", accession);
        }

        report.kept += 1;
        output.push(stanza);
    }

    info!(
        kept = report.kept,
        dropped_obsolete = report.dropped_obsolete,
        dropped_other = report.dropped_other,
        "Filtered disease ontology"
    );
    (output, report)
}
