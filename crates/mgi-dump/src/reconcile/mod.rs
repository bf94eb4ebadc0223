//! Ontology reconcilers
//!
//! Each reconciler takes a parsed stanza list plus its side inputs and returns
//! the corrected stanza list together with a serializable report. None of them
//! touch the filesystem; the commands do the reading and writing.
//!
//! - [`remosh`]: re-apply merge/leaf decisions from a cross-mapping table
//! - [`medic`]: conflate a disease vocabulary with authoritative names
//! - [`disease`]: trim a disease ontology down to live terms
//! - [`anatomy`]: merge staged anatomy vocabularies and place GXD structures

pub mod anatomy;
pub mod disease;
pub mod medic;
pub mod remosh;

use mgi_common::obo::Stanza;
use std::collections::BTreeSet;
use tracing::info;

/// Render a synonym value: `"text" SCOPE [xrefs]`
pub fn synonym_value(text: &str, scope: Option<&str>, xrefs: &[&str]) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    match scope {
        Some(scope) => format!("\"{}\" {} [{}]", escaped, scope, xrefs.join(", ")),
        None => format!("\"{}\" [{}]", escaped, xrefs.join(", ")),
    }
}

/// Xrefs between the trailing brackets of a synonym value
pub fn synonym_xrefs(value: &str) -> Vec<&str> {
    let Some(open) = value.rfind('[') else {
        return Vec::new();
    };
    let inner = &value[open + 1..];
    let inner = inner.find(']').map_or(inner, |close| &inner[..close]);
    inner
        .split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .collect()
}

/// Ids and alt_ids of every term in `stanzas`
pub fn known_ids(stanzas: &[Stanza]) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for stanza in stanzas.iter().filter(|s| s.is_term()) {
        ids.extend(stanza.values("id").map(str::to_string));
        ids.extend(stanza.alt_ids().map(str::to_string));
    }
    ids
}

/// Log every id of a diagnostic set followed by its count
pub(crate) fn report_set(label: &str, ids: &[String]) {
    for id in ids {
        info!(id = %id, "{}", label);
    }
    if !ids.is_empty() {
        info!(count = ids.len(), "{}", label);
    }
}
