//! Flat text index over a rendered document
//!
//! Walks visible text nodes under the content root and concatenates their whitespace
//! normalized text, one space between nodes. Each contributing node gets a segment with its
//! `[start, end)` range in the flat text, so offsets found in the flat text can be mapped back
//! to a node and a local offset.

use crate::dom::{Document, DomPoint, NodeId};
use crate::normalize::collapse_whitespace;

/// Elements whose text is never reading content
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "math", "svg", "head"];

/// One text node's slice of the flat text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub node: NodeId,
    /// Inclusive start, in chars of the flat text
    pub start: usize,
    /// Exclusive end, in chars of the flat text
    pub end: usize,
    /// The node's text before whitespace normalization
    pub source_text: String,
}

impl TextSegment {
    /// Map a char offset within this segment's normalized text to a char offset in
    /// `source_text`. Offsets past the end clamp to the source length.
    pub fn source_offset(&self, local: usize) -> usize {
        let mut normalized = 0;
        let mut in_space = true; // leading whitespace is trimmed
        let mut seen_content = false;

        for (index, ch) in self.source_text.chars().enumerate() {
            if ch.is_whitespace() {
                if !in_space && seen_content {
                    // This char becomes the single collapsed space
                    if normalized == local {
                        return index;
                    }
                    normalized += 1;
                }
                in_space = true;
                continue;
            }
            in_space = false;
            seen_content = true;
            if normalized == local {
                return index;
            }
            normalized += 1;
        }
        self.source_text.chars().count()
    }

    /// Map an exclusive end offset within the normalized text to the source text
    pub fn source_end_offset(&self, local_end: usize) -> usize {
        if local_end == 0 {
            return self.source_offset(0);
        }
        self.source_offset(local_end - 1) + 1
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Flat text of a section plus its segment table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextIndex {
    pub flat_text: String,
    pub segments: Vec<TextSegment>,
}

impl TextIndex {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of chars in the flat text
    pub fn char_len(&self) -> usize {
        self.segments.last().map_or(0, |s| s.end)
    }

    /// Map a flat-text start offset to a node position.
    ///
    /// Offsets landing on the separator space between segments snap forward to the next
    /// segment's start.
    pub fn locate_start(&self, offset: usize) -> Option<DomPoint> {
        let segment = self.segments.iter().find(|s| s.end > offset)?;
        let local = offset.saturating_sub(segment.start);
        Some(DomPoint {
            node: segment.node,
            offset: segment.source_offset(local),
        })
    }

    /// Map an exclusive flat-text end offset to a node position.
    ///
    /// Offsets landing on a separator snap back to the previous segment's end.
    pub fn locate_end(&self, offset: usize) -> Option<DomPoint> {
        let segment = self.segments.iter().rev().find(|s| s.start < offset)?;
        let local = offset.min(segment.end) - segment.start;
        Some(DomPoint {
            node: segment.node,
            offset: segment.source_end_offset(local),
        })
    }
}

/// Build the flat text index of `doc`.
///
/// A document without a root element produces an empty index, which callers treat as
/// "no match possible".
pub fn build_index(doc: &Document) -> TextIndex {
    let Some(content_root) = doc.content_root() else {
        return TextIndex::default();
    };

    let mut index = TextIndex::default();
    let mut cursor = 0usize;
    let mut stack = vec![content_root];

    while let Some(id) = stack.pop() {
        if let Some(tag) = doc.tag(id) {
            if SKIPPED_ELEMENTS.contains(&tag) {
                continue;
            }
            stack.extend(doc.children(id).iter().rev().copied());
            continue;
        }

        let Some(source) = doc.text(id) else {
            continue;
        };
        let normalized = collapse_whitespace(source);
        if normalized.is_empty() {
            continue;
        }

        if !index.flat_text.is_empty() {
            index.flat_text.push(' ');
            cursor += 1;
        }
        let len = normalized.chars().count();
        index.flat_text.push_str(&normalized);
        index.segments.push(TextSegment {
            node: id,
            start: cursor,
            end: cursor + len,
            source_text: source.to_string(),
        });
        cursor += len;
    }

    index
}
