//! XHTML content document loading
//!
//! EPUB chapters are XHTML, so a strict XML parser is enough. HTML named entities that XML
//! does not predefine are mapped to numeric references before parsing.

use thiserror::Error;

use super::{Document, NodeId};

/// Errors while building a [`Document`] from markup
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("XHTML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// HTML entities commonly found in EPUB content that XML rejects
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", "&#160;"),
    ("&mdash;", "&#8212;"),
    ("&ndash;", "&#8211;"),
    ("&hellip;", "&#8230;"),
    ("&lsquo;", "&#8216;"),
    ("&rsquo;", "&#8217;"),
    ("&ldquo;", "&#8220;"),
    ("&rdquo;", "&#8221;"),
    ("&copy;", "&#169;"),
    ("&shy;", "&#173;"),
];

/// Parse an XHTML content document into a [`Document`].
///
/// Comments and processing instructions are dropped; adjacent text (e.g. around a dropped
/// comment) is merged into a single text node so CFI text steps stay unambiguous.
pub fn parse_xhtml(source: &str) -> Result<Document, DocumentError> {
    let mut prepared = source.to_string();
    for (named, numeric) in NAMED_ENTITIES {
        if prepared.contains(named) {
            prepared = prepared.replace(named, numeric);
        }
    }

    let mut options = roxmltree::ParsingOptions::default();
    options.allow_dtd = true;
    let xml = roxmltree::Document::parse_with_options(&prepared, options)?;

    let mut doc = Document::new();
    let xml_root = xml.root_element();
    let root = doc.create_root(&xml_root.tag_name().name().to_ascii_lowercase());
    copy_children(&mut doc, root, xml_root);
    Ok(doc)
}

fn copy_children(doc: &mut Document, parent: NodeId, source: roxmltree::Node<'_, '_>) {
    for child in source.children() {
        if child.is_element() {
            let tag = child.tag_name().name().to_ascii_lowercase();
            let id = match child.attribute("id") {
                Some(id) => doc.append_element_with_id(parent, &tag, id),
                None => doc.append_element(parent, &tag),
            };
            copy_children(doc, id, child);
        } else if child.is_text() {
            if let Some(text) = child.text() {
                doc.append_merged_text(parent, text);
            }
        }
    }
}
