//! Rendered document model
//!
//! A small arena tree standing in for the rendering surface's DOM. Sections hand out an
//! `Arc<Document>`; the text index, matcher and CFI bridging all work against this type.
//!
//! Offsets inside text nodes are counted in Unicode scalar values (`char`), never bytes.

mod xhtml;

use serde::{Deserialize, Serialize};

pub use xhtml::{parse_xhtml, DocumentError};

/// Index of a node inside its [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Element or text payload of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String, id: Option<String> },
    Text(String),
}

/// A node and its links
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// A position inside a text node (char offset into its source text)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomPoint {
    pub node: NodeId,
    pub offset: usize,
}

/// A node-level range, the equivalent of a DOM `Range` between two text positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: DomPoint,
    pub end: DomPoint,
}

impl TextRange {
    pub fn new(start: DomPoint, end: DomPoint) -> Self {
        Self { start, end }
    }
}

/// Arena-backed document tree
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Document {
    /// Create an empty document (no root element)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `<html><body><p>..</p>..</body></html>` with one paragraph per entry
    pub fn from_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> Self {
        let mut doc = Self::new();
        let html = doc.create_root("html");
        let body = doc.append_element(html, "body");
        for text in paragraphs {
            let p = doc.append_element(body, "p");
            doc.append_text(p, text.as_ref());
        }
        doc
    }

    /// Create (or replace) the root element
    pub fn create_root(&mut self, tag: &str) -> NodeId {
        let id = self.push(NodeKind::Element {
            tag: tag.to_string(),
            id: None,
        }, None);
        self.root = Some(id);
        id
    }

    /// Append a child element
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append(parent, NodeKind::Element {
            tag: tag.to_string(),
            id: None,
        })
    }

    /// Append a child element carrying an `id` attribute
    pub fn append_element_with_id(&mut self, parent: NodeId, tag: &str, id: &str) -> NodeId {
        self.append(parent, NodeKind::Element {
            tag: tag.to_string(),
            id: Some(id.to_string()),
        })
    }

    /// Append a text node
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeKind::Text(text.to_string()))
    }

    /// Detach `child` from `parent`. The node stays in the arena but is unreachable.
    pub fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.parent(child) {
            if let Some(node) = self.nodes.get_mut(parent.0) {
                node.children.retain(|c| *c != child);
            }
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = None;
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Element tag name, lowercase as stored
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Element `id` attribute
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Element { id, .. }) => id.as_deref(),
            _ => None,
        }
    }

    /// Source text of a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    /// Root of readable content: `<body>` when present, otherwise the root element
    pub fn content_root(&self) -> Option<NodeId> {
        let root = self.root?;
        self.find_element("body").or(Some(root))
    }

    /// First element with the given tag in document order
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        let root = self.root?;
        self.descendants(root)
            .find(|id| self.tag(*id).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    /// Pre-order traversal starting at (and including) `from`
    pub fn descendants(&self, from: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: vec![from],
        }
    }

    /// All reachable text nodes in document order
    pub fn text_nodes(&self) -> Vec<NodeId> {
        match self.root {
            Some(root) => self.descendants(root).filter(|id| self.is_text(*id)).collect(),
            None => Vec::new(),
        }
    }

    /// Concatenated text of all text nodes below `node`
    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .filter_map(|id| self.text(id))
            .collect::<Vec<_>>()
            .join("")
    }

    /// The text a range covers, like `Range.toString()`.
    ///
    /// Distinct text nodes are joined with a single space so block boundaries do not glue
    /// words together. Returns `None` when an endpoint is not a reachable text node or the
    /// range runs backwards.
    pub fn text_in_range(&self, range: &TextRange) -> Option<String> {
        let order = self.text_nodes();
        let start_pos = order.iter().position(|id| *id == range.start.node)?;
        let end_pos = order.iter().position(|id| *id == range.end.node)?;
        if end_pos < start_pos {
            return None;
        }

        if start_pos == end_pos {
            let chars: Vec<char> = self.text(range.start.node)?.chars().collect();
            let start = range.start.offset.min(chars.len());
            let end = range.end.offset.min(chars.len());
            if end < start {
                return None;
            }
            return Some(chars[start..end].iter().collect());
        }

        let mut parts = Vec::with_capacity(end_pos - start_pos + 1);
        for (i, id) in order[start_pos..=end_pos].iter().enumerate() {
            let text = self.text(*id)?;
            let part: String = if i == 0 {
                text.chars().skip(range.start.offset).collect()
            } else if start_pos + i == end_pos {
                text.chars().take(range.end.offset).collect()
            } else {
                text.to_string()
            };
            parts.push(part);
        }
        Some(parts.join(" "))
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push(kind, Some(parent));
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(id);
        }
        id
    }

    /// Append text to the last child of `parent` if it is a text node, otherwise add one
    fn append_merged_text(&mut self, parent: NodeId, text: &str) {
        if let Some(last) = self.children(parent).last().copied() {
            if let Some(NodeKind::Text(existing)) = self.nodes.get_mut(last.0).map(|n| &mut n.kind)
            {
                existing.push_str(text);
                return;
            }
        }
        self.append_text(parent, text);
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}
