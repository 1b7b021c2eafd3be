//! Rendering engine capability interface
//!
//! The anchoring core never talks to a concrete renderer. Everything it needs (resolving a
//! position id, enumerating and loading sections, drawing decorations) goes through
//! [`RenderingEngine`] and [`SectionHandle`]; adapters translate a real renderer into these
//! traits at the boundary. [`MemoryEngine`] is the in-process adapter over XHTML sections.

mod lease;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dom::{Document, TextRange};
use crate::error::Result;
use crate::matcher::find_best_range;
use crate::text_index::build_index;

pub use lease::SectionLease;
pub use memory::{DecorationOp, MemoryEngine};

/// One entry of the reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpineItem {
    /// 0-based spine position
    pub index: usize,
    pub href: String,
    /// Manifest idref, used as the spine step assertion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idref: Option<String>,
    /// Non-linear items (footnote pages, answer keys) are outside the reading order
    pub linear: bool,
}

/// What a position id currently points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRange {
    pub href: String,
    pub range: TextRange,
    pub text: String,
}

/// Decoration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecorationKind {
    Highlight,
    Underline,
    Bookmark,
    SearchMatch,
}

/// A decoration as handed to the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoration {
    pub kind: DecorationKind,
    pub position_id: String,
    pub style_class: String,
}

/// Screen rectangle of an interaction, in viewport pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenAnchor {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Installed together with a decoration; invoked when the reader activates it
pub type ActivateHandler = Arc<dyn Fn(ScreenAnchor) + Send + Sync>;

/// A rendered or loaded section
pub trait SectionHandle: Send + Sync {
    fn index(&self) -> usize;

    fn href(&self) -> &str;

    /// The section's document, `None` while it is not mounted
    fn document(&self) -> Option<Arc<Document>>;

    /// The renderer's own text lookup; defaults to the quote matcher without context
    fn range_from_text(&self, quote: &str) -> Option<TextRange> {
        let doc = self.document()?;
        find_best_range(&build_index(&doc), quote, None, None)
    }

    /// Position id addressing `range` in this section
    fn position_from_range(&self, range: &TextRange) -> Result<String>;
}

/// The rendering engine as seen by the anchoring core
#[async_trait]
pub trait RenderingEngine: Send + Sync {
    /// What `position_id` points at right now, if anything
    fn resolve_position(&self, position_id: &str) -> Option<ResolvedRange>;

    /// Navigate the view to `position_id`
    async fn display_at(&self, position_id: &str) -> Result<()>;

    /// Sections currently on screen
    fn rendered_sections(&self) -> Vec<Arc<dyn SectionHandle>>;

    /// The full reading order
    fn spine(&self) -> Vec<SpineItem>;

    /// Load a section for inspection. Every call must be paired with [`unload_section`];
    /// use [`SectionLease`] rather than calling this directly.
    ///
    /// [`unload_section`]: RenderingEngine::unload_section
    async fn load_section(&self, index: usize) -> Result<Arc<dyn SectionHandle>>;

    fn unload_section(&self, index: usize);

    /// Draw a decoration; `on_activate` is wired up as part of the same operation
    fn add_decoration(&self, decoration: Decoration, on_activate: ActivateHandler);

    fn remove_decoration(&self, position_id: &str, kind: DecorationKind);
}

/// Compare section hrefs ignoring fragments and leading directories
pub fn href_matches(a: &str, b: &str) -> bool {
    let a = a.split('#').next().unwrap_or(a).trim_start_matches("./");
    let b = b.split('#').next().unwrap_or(b).trim_start_matches("./");
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.ends_with(&format!("/{b}")) || b.ends_with(&format!("/{a}"))
}
