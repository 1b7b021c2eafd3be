//! Mapping between CFI steps and [`Document`] nodes
//!
//! Children are numbered the CFI way: elements get even indices (2, 4, ...), the text between
//! them odd indices (1 before the first element, 3 after it, ...). Steps start below the root
//! element, which is where the indirection lands.

use crate::dom::{Document, DomPoint, NodeId, TextRange};

use super::generator::generate_range;
use super::types::{Cfi, CfiPath, CfiStep, StepKind};

/// CFI index of `child` within `parent`
fn child_index(doc: &Document, parent: NodeId, child: NodeId) -> Option<u32> {
    let mut elements = 0u32;
    for id in doc.children(parent) {
        let is_element = !doc.is_text(*id);
        if *id == child {
            return Some(if is_element { (elements + 1) * 2 } else { elements * 2 + 1 });
        }
        if is_element {
            elements += 1;
        }
    }
    None
}

/// Steps from the root element down to `node`; `None` if the node is detached
pub fn node_steps(doc: &Document, node: NodeId) -> Option<Vec<CfiStep>> {
    let root = doc.root()?;
    let mut steps = Vec::new();
    let mut current = node;

    while current != root {
        let parent = doc.parent(current)?;
        let index = child_index(doc, parent, current)?;
        let step = match doc.element_id(current) {
            Some(id) => CfiStep::child_with_id(index, id),
            None => CfiStep::child(index),
        };
        steps.push(step);
        current = parent;
    }

    steps.reverse();
    Some(steps)
}

/// Walk content steps from the root element
pub fn resolve_steps(doc: &Document, steps: &[CfiStep]) -> Option<NodeId> {
    let mut current = doc.root()?;
    for step in steps {
        let StepKind::Child(wanted) = step.kind else {
            continue;
        };
        current = doc
            .children(current)
            .iter()
            .copied()
            .find(|child| child_index(doc, current, *child) == Some(wanted))?;
    }
    Some(current)
}

fn point_for(doc: &Document, path: &CfiPath) -> Option<DomPoint> {
    let node = resolve_steps(doc, path.content_steps())?;
    if let Some(text) = doc.text(node) {
        let len = text.chars().count();
        let offset = (path.offset.unwrap_or(0) as usize).min(len);
        return Some(DomPoint { node, offset });
    }

    let first_text = doc.descendants(node).find(|id| doc.is_text(*id))?;
    Some(DomPoint {
        node: first_text,
        offset: 0,
    })
}

/// Position id for a node range in spine item `spine_index`
pub fn range_to_cfi(doc: &Document, spine_index: usize, spine_id: Option<&str>, range: &TextRange) -> Option<Cfi> {
    let start_steps = node_steps(doc, range.start.node)?;
    let end_steps = node_steps(doc, range.end.node)?;
    Some(generate_range(
        spine_index,
        spine_id,
        start_steps,
        u32::try_from(range.start.offset).ok()?,
        end_steps,
        u32::try_from(range.end.offset).ok()?,
    ))
}

/// Node range addressed by `cfi`; points come back collapsed
pub fn cfi_to_range(doc: &Document, cfi: &Cfi) -> Option<TextRange> {
    let start = point_for(doc, &cfi.start())?;
    let end = point_for(doc, &cfi.end())?;
    Some(TextRange::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_xhtml;

    const CHAPTER: &str = r#"<html><head><title>t</title></head><body>
<p>First paragraph.</p><p id="p2">Second <em>emphasis</em> tail.</p></body></html>"#;

    #[test]
    fn test_node_steps_round_trip() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        for node in doc.text_nodes() {
            let steps = node_steps(&doc, node).unwrap();
            assert_eq!(resolve_steps(&doc, &steps), Some(node));
        }
    }

    #[test]
    fn test_steps_use_even_and_odd_indices() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tail = doc
            .text_nodes()
            .into_iter()
            .find(|id| doc.text(*id) == Some(" tail."))
            .unwrap();
        let path = CfiPath::new(node_steps(&doc, tail).unwrap(), None).to_string();
        // body is the 2nd element of html, p#p2 the 2nd element of body,
        // " tail." the text after the first element of p
        assert_eq!(path, "/4/4[p2]/3");
    }

    #[test]
    fn test_range_round_trip() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let nodes = doc.text_nodes();
        let second = nodes.iter().copied().find(|id| doc.text(*id) == Some("Second ")).unwrap();
        let emphasis = nodes.iter().copied().find(|id| doc.text(*id) == Some("emphasis")).unwrap();
        let range = TextRange::new(
            DomPoint { node: second, offset: 0 },
            DomPoint { node: emphasis, offset: 4 },
        );

        let cfi = range_to_cfi(&doc, 3, None, &range).unwrap();
        assert!(cfi.to_string().starts_with("epubcfi(/6/8!/4/4[p2],"));
        assert_eq!(cfi.spine_index(), Some(3));
        assert_eq!(cfi_to_range(&doc, &cfi), Some(range));
        assert_eq!(doc.text_in_range(&range).as_deref(), Some("Second  emph"));
    }

    #[test]
    fn test_unknown_steps_do_not_resolve() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        assert!(resolve_steps(&doc, &[CfiStep::child(4), CfiStep::child(40)]).is_none());
    }
}
