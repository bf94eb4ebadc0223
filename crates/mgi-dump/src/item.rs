//! Output items
//!
//! An [`Item`] is one entity of the warehouse interchange format: a class, an
//! id, and an ordered list of attributes, references and collections. Ids are
//! kept structured until [`Item::render`] turns them into `ref_id` strings.

use crate::registry::ItemId;
use quick_xml::escape::escape;
use std::fmt::Write;

/// Attribute value the source uses for "no data"; such attributes are left out
pub const NOT_APPLICABLE: &str = "Not Applicable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Attribute { name: String, value: String },
    Reference { name: String, target: ItemId },
    Collection { name: String, targets: Vec<ItemId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub class: String,
    pub id: ItemId,
    pub fields: Vec<Field>,
}

impl Item {
    pub fn new(class: impl Into<String>, id: ItemId) -> Self {
        Self {
            class: class.into(),
            id,
            fields: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push(Field::Attribute {
            name: name.into(),
            value: value.to_string(),
        });
        self
    }

    /// Attribute that is only written when a value is present
    pub fn optional_attribute<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.attribute(name, value),
            None => self,
        }
    }

    pub fn reference(mut self, name: impl Into<String>, target: ItemId) -> Self {
        self.fields.push(Field::Reference {
            name: name.into(),
            target,
        });
        self
    }

    pub fn collection(mut self, name: impl Into<String>, targets: Vec<ItemId>) -> Self {
        self.fields.push(Field::Collection {
            name: name.into(),
            targets,
        });
        self
    }

    /// Every id this item points at, in field order
    pub fn referenced_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.fields.iter().flat_map(|field| match field {
            Field::Attribute { .. } => Vec::new(),
            Field::Reference { target, .. } => vec![*target],
            Field::Collection { targets, .. } => targets.clone(),
        })
    }

    /// Render as an `<item>` element followed by a newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = writeln!(out, "<item class=\"{}\" id=\"{}\">", quote(&self.class), self.id);
        for field in &self.fields {
            match field {
                Field::Attribute { name, value } => {
                    if value.eq_ignore_ascii_case(NOT_APPLICABLE) {
                        continue;
                    }
                    let _ = writeln!(
                        out,
                        "  <attribute name=\"{}\" value=\"{}\" />",
                        quote(name),
                        quote(value)
                    );
                },
                Field::Reference { name, target } => {
                    let _ = writeln!(out, "  <reference name=\"{}\" ref_id=\"{}\" />", quote(name), target);
                },
                Field::Collection { name, targets } => {
                    let _ = writeln!(out, "  <collection name=\"{}\">", quote(name));
                    for target in targets {
                        let _ = writeln!(out, "    <reference ref_id=\"{}\" />", target);
                    }
                    let _ = writeln!(out, "  </collection>");
                },
            }
        }
        out.push_str("</item>\n");
        out
    }
}

/// Characters XML 1.0 does not allow anywhere in a document
pub fn is_invalid_xml_char(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

/// Make a string safe for use as an attribute value
pub fn quote(value: &str) -> String {
    let cleaned: String = value.chars().filter(|c| !is_invalid_xml_char(*c)).collect();
    escape(cleaned.as_str()).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::TypeKey;

    #[test]
    fn test_render_all_field_kinds() {
        let item = Item::new("Marker", ItemId::new(TypeKey::MARKER, 1001))
            .attribute("symbol", "Pax6")
            .reference("organism", ItemId::new(TypeKey::ORGANISM, 1001))
            .collection(
                "publications",
                vec![ItemId::new(TypeKey::REFERENCE, 1001), ItemId::new(TypeKey::REFERENCE, 1002)],
            );

        let expected = "<item class=\"Marker\" id=\"2_1001\">\n\
                        \x20 <attribute name=\"symbol\" value=\"Pax6\" />\n\
                        \x20 <reference name=\"organism\" ref_id=\"20_1001\" />\n\
                        \x20 <collection name=\"publications\">\n\
                        \x20   <reference ref_id=\"1_1001\" />\n\
                        \x20   <reference ref_id=\"1_1002\" />\n\
                        \x20 </collection>\n\
                        </item>\n";
        assert_eq!(item.render(), expected);
    }

    #[test]
    fn test_not_applicable_is_suppressed() {
        let item = Item::new("Allele", ItemId::new(TypeKey::ALLELE, 1))
            .attribute("transmission", "not applicable")
            .attribute("symbol", "a");
        let rendered = item.render();
        assert!(!rendered.contains("transmission"));
        assert!(rendered.contains("symbol"));
    }

    #[test]
    fn test_values_are_quoted() {
        assert_eq!(quote("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(quote("bad\u{1}char"), "badchar");
        assert_eq!(quote("tab\tok"), "tab\tok");
    }

    #[test]
    fn test_optional_attribute_and_referenced_ids() {
        let organism = ItemId::new(TypeKey::ORGANISM, 1);
        let item = Item::new("Strain", ItemId::new(TypeKey::STRAIN, 1))
            .optional_attribute("name", None::<&str>)
            .reference("organism", organism);
        assert_eq!(item.fields.len(), 1);
        assert_eq!(item.referenced_ids().collect::<Vec<_>>(), vec![organism]);
    }
}
