//! In-process rendering engine over XHTML sections
//!
//! Holds every section as a parsed [`Document`] and keeps the bookkeeping a real renderer
//! would: which sections are on screen, which are loaded for inspection, and which
//! decorations are drawn. Failure and latency injection make it usable as a test double,
//! [`MemoryEngine::replace_section`] simulates a reflow and [`MemoryEngine::unmount`] a
//! section whose rendering surface is momentarily gone.
//!
//! All state sits behind a `parking_lot::Mutex`; no lock is held across an await or while
//! an activation handler runs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use super::{
    ActivateHandler, Decoration, DecorationKind, RenderingEngine, ResolvedRange, ScreenAnchor,
    SectionHandle, SpineItem,
};
use crate::cfi::{cfi_to_range, parse, range_to_cfi, try_parse};
use crate::dom::{parse_xhtml, Document, TextRange};
use crate::error::{AnchorError, Result};
use crate::matcher::find_best_range;
use crate::text_index::build_index;

/// One entry of the decoration operation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DecorationOp {
    Add(Decoration),
    Remove {
        #[serde(rename = "positionId")]
        position_id: String,
        kind: DecorationKind,
    },
}

struct StoredSection {
    item: SpineItem,
    document: Arc<Document>,
}

struct DrawnDecoration {
    decoration: Decoration,
    on_activate: ActivateHandler,
}

#[derive(Default)]
struct EngineState {
    sections: Vec<StoredSection>,
    rendered: BTreeSet<usize>,
    /// Outstanding inspection loads per section
    loaded: HashMap<usize, usize>,
    failing_loads: HashSet<usize>,
    failing_positions: HashSet<usize>,
    /// Sections whose handles currently come without a document
    unmounted: HashSet<usize>,
    decorations: HashMap<(String, DecorationKind), DrawnDecoration>,
    ops: Vec<DecorationOp>,
    load_count: usize,
    unload_count: usize,
    displayed: Option<String>,
}

impl EngineState {
    fn is_mounted(&self, index: usize) -> bool {
        let attached = self.rendered.contains(&index) || self.loaded.contains_key(&index);
        attached && !self.unmounted.contains(&index)
    }

    fn handle(&self, index: usize) -> Option<Arc<dyn SectionHandle>> {
        let section = self.sections.get(index)?;
        let document = (!self.unmounted.contains(&index)).then(|| Arc::clone(&section.document));
        Some(Arc::new(MemorySection {
            item: section.item.clone(),
            document,
            fail_positions: self.failing_positions.contains(&index),
        }))
    }
}

/// Section handle handed out by [`MemoryEngine`]
struct MemorySection {
    item: SpineItem,
    document: Option<Arc<Document>>,
    fail_positions: bool,
}

impl SectionHandle for MemorySection {
    fn index(&self) -> usize {
        self.item.index
    }

    fn href(&self) -> &str {
        &self.item.href
    }

    fn document(&self) -> Option<Arc<Document>> {
        self.document.clone()
    }

    fn position_from_range(&self, range: &TextRange) -> Result<String> {
        if self.fail_positions {
            return Err(AnchorError::UnaddressableRange(format!(
                "positions disabled for {}",
                self.item.href
            )));
        }
        let doc = self
            .document
            .as_ref()
            .ok_or(AnchorError::SectionUnavailable(self.item.index))?;
        range_to_cfi(doc, self.item.index, self.item.idref.as_deref(), range)
            .map(|cfi| cfi.to_string())
            .ok_or_else(|| AnchorError::UnaddressableRange(self.item.href.clone()))
    }
}

/// Rendering engine backed by in-memory documents
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<EngineState>,
    load_delay: Option<Duration>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every section load take `delay`
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Append a linear section parsed from XHTML; returns its spine index
    pub fn add_section(&self, href: &str, xhtml: &str) -> Result<usize> {
        let document = parse_xhtml(xhtml)?;
        Ok(self.add_document(href, document))
    }

    /// Append a linear section from an already built document
    pub fn add_document(&self, href: &str, document: Document) -> usize {
        let mut state = self.state.lock();
        let index = state.sections.len();
        state.sections.push(StoredSection {
            item: SpineItem {
                index,
                href: href.to_string(),
                idref: None,
                linear: true,
            },
            document: Arc::new(document),
        });
        index
    }

    pub fn set_linear(&self, index: usize, linear: bool) {
        if let Some(section) = self.state.lock().sections.get_mut(index) {
            section.item.linear = linear;
        }
    }

    pub fn set_idref(&self, index: usize, idref: &str) {
        if let Some(section) = self.state.lock().sections.get_mut(index) {
            section.item.idref = Some(idref.to_string());
        }
    }

    /// Put a section on screen
    pub fn render(&self, index: usize) {
        self.state.lock().rendered.insert(index);
    }

    /// Replace the on-screen set
    pub fn render_only(&self, indices: &[usize]) {
        let mut state = self.state.lock();
        state.rendered = indices.iter().copied().collect();
    }

    /// Swap a section's content, as a reflow or re-render would
    pub fn replace_section(&self, index: usize, xhtml: &str) -> Result<()> {
        let document = parse_xhtml(xhtml)?;
        self.replace_document(index, document)
    }

    pub fn replace_document(&self, index: usize, document: Document) -> Result<()> {
        let mut state = self.state.lock();
        let section = state
            .sections
            .get_mut(index)
            .ok_or_else(|| AnchorError::SectionNotFound(index.to_string()))?;
        section.document = Arc::new(document);
        Ok(())
    }

    /// Make loads of `index` fail
    pub fn fail_loads(&self, index: usize) {
        self.state.lock().failing_loads.insert(index);
    }

    /// Make position derivation in `index` fail
    pub fn fail_positions(&self, index: usize) {
        self.state.lock().failing_positions.insert(index);
    }

    /// Detach a section's document, as while its view is being rebuilt. The section stays in
    /// the rendered set but its handles carry no document and its positions do not resolve.
    pub fn unmount(&self, index: usize) {
        self.state.lock().unmounted.insert(index);
    }

    pub fn remount(&self, index: usize) {
        self.state.lock().unmounted.remove(&index);
    }

    pub fn document(&self, index: usize) -> Option<Arc<Document>> {
        self.state
            .lock()
            .sections
            .get(index)
            .map(|s| Arc::clone(&s.document))
    }

    /// Position id of the best match for `quote` in section `index`, as a selection would
    /// produce it
    pub fn position_for_text(&self, index: usize, quote: &str) -> Option<String> {
        let handle = self.state.lock().handle(index)?;
        let doc = handle.document()?;
        let range = find_best_range(&build_index(&doc), quote, None, None)?;
        handle.position_from_range(&range).ok()
    }

    pub fn load_count(&self) -> usize {
        self.state.lock().load_count
    }

    pub fn unload_count(&self) -> usize {
        self.state.lock().unload_count
    }

    /// Sections currently loaded for inspection
    pub fn loaded_sections(&self) -> Vec<usize> {
        let mut loaded: Vec<usize> = self.state.lock().loaded.keys().copied().collect();
        loaded.sort_unstable();
        loaded
    }

    /// Drawn decorations ordered by position id then kind
    pub fn decorations(&self) -> Vec<Decoration> {
        let mut drawn: Vec<Decoration> = self
            .state
            .lock()
            .decorations
            .values()
            .map(|d| d.decoration.clone())
            .collect();
        drawn.sort_by(|a, b| a.position_id.cmp(&b.position_id).then(a.kind.cmp(&b.kind)));
        drawn
    }

    pub fn decoration_count(&self) -> usize {
        self.state.lock().decorations.len()
    }

    pub fn decoration_ops(&self) -> Vec<DecorationOp> {
        self.state.lock().ops.clone()
    }

    /// Drain the operation log
    pub fn take_decoration_ops(&self) -> Vec<DecorationOp> {
        std::mem::take(&mut self.state.lock().ops)
    }

    /// Last position passed to `display_at`
    pub fn displayed(&self) -> Option<String> {
        self.state.lock().displayed.clone()
    }

    /// Simulate the reader clicking a decoration. Returns false if nothing is drawn there.
    pub fn activate(&self, position_id: &str, kind: DecorationKind, anchor: ScreenAnchor) -> bool {
        let handler = self
            .state
            .lock()
            .decorations
            .get(&(position_id.to_string(), kind))
            .map(|d| Arc::clone(&d.on_activate));

        match handler {
            Some(handler) => {
                handler(anchor);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RenderingEngine for MemoryEngine {
    fn resolve_position(&self, position_id: &str) -> Option<ResolvedRange> {
        let cfi = try_parse(position_id)?;
        let index = cfi.spine_index()?;

        let state = self.state.lock();
        if !state.is_mounted(index) {
            return None;
        }
        let section = state.sections.get(index)?;
        let range = cfi_to_range(&section.document, &cfi)?;
        let text = section.document.text_in_range(&range)?;
        Some(ResolvedRange {
            href: section.item.href.clone(),
            range,
            text,
        })
    }

    async fn display_at(&self, position_id: &str) -> Result<()> {
        let cfi = parse(position_id)?;
        let index = cfi
            .spine_index()
            .ok_or_else(|| AnchorError::PositionUnresolved(position_id.to_string()))?;

        let mut state = self.state.lock();
        if index >= state.sections.len() {
            return Err(AnchorError::SectionNotFound(index.to_string()));
        }
        state.rendered = BTreeSet::from([index]);
        state.displayed = Some(position_id.to_string());
        Ok(())
    }

    fn rendered_sections(&self) -> Vec<Arc<dyn SectionHandle>> {
        let state = self.state.lock();
        state
            .rendered
            .iter()
            .filter_map(|index| state.handle(*index))
            .collect()
    }

    fn spine(&self) -> Vec<SpineItem> {
        self.state
            .lock()
            .sections
            .iter()
            .map(|s| s.item.clone())
            .collect()
    }

    async fn load_section(&self, index: usize) -> Result<Arc<dyn SectionHandle>> {
        self.state.lock().load_count += 1;

        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.failing_loads.contains(&index) {
            return Err(AnchorError::SectionLoad {
                index,
                reason: "injected failure".to_string(),
            });
        }
        let handle = state
            .handle(index)
            .ok_or_else(|| AnchorError::SectionNotFound(index.to_string()))?;
        *state.loaded.entry(index).or_insert(0) += 1;
        Ok(handle)
    }

    fn unload_section(&self, index: usize) {
        let mut state = self.state.lock();
        state.unload_count += 1;
        if let Some(count) = state.loaded.get_mut(&index) {
            *count -= 1;
            if *count == 0 {
                state.loaded.remove(&index);
            }
        }
    }

    fn add_decoration(&self, decoration: Decoration, on_activate: ActivateHandler) {
        let mut state = self.state.lock();
        state.ops.push(DecorationOp::Add(decoration.clone()));
        let key = (decoration.position_id.clone(), decoration.kind);
        state.decorations.insert(
            key,
            DrawnDecoration {
                decoration,
                on_activate,
            },
        );
    }

    fn remove_decoration(&self, position_id: &str, kind: DecorationKind) {
        let mut state = self.state.lock();
        state.ops.push(DecorationOp::Remove {
            position_id: position_id.to_string(),
            kind,
        });
        state.decorations.remove(&(position_id.to_string(), kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SectionLease;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine_with(paragraphs: &[&[&str]]) -> MemoryEngine {
        let engine = MemoryEngine::new();
        for (i, section) in paragraphs.iter().enumerate() {
            engine.add_document(&format!("ch{}.xhtml", i + 1), Document::from_paragraphs(section));
        }
        engine
    }

    #[test]
    fn test_position_resolves_only_when_mounted() {
        let engine = engine_with(&[&["She walked toward the quiet house."]]);
        let pid = engine.position_for_text(0, "quiet house").unwrap();

        assert!(engine.resolve_position(&pid).is_none());
        engine.render(0);
        let resolved = engine.resolve_position(&pid).unwrap();
        assert_eq!(resolved.text, "quiet house");
        assert_eq!(resolved.href, "ch1.xhtml");
    }

    #[test]
    fn test_garbage_position_does_not_resolve() {
        let engine = engine_with(&[&["text"]]);
        engine.render(0);
        assert!(engine.resolve_position("not a cfi").is_none());
        assert!(engine.resolve_position("epubcfi(/6/40!/4/2/1:0)").is_none());
    }

    #[tokio::test]
    async fn test_lease_unloads_once() {
        let memory = Arc::new(engine_with(&[&["one"], &["two"]]));
        let engine: Arc<dyn RenderingEngine> = memory.clone();
        {
            let lease = SectionLease::acquire(&engine, 1).await.unwrap();
            assert_eq!(lease.handle().href(), "ch2.xhtml");
            assert_eq!(memory.loaded_sections(), vec![1]);
        }
        assert_eq!(memory.load_count(), 1);
        assert_eq!(memory.unload_count(), 1);
        assert!(memory.loaded_sections().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_still_unloads() {
        let memory = Arc::new(engine_with(&[&["one"]]));
        memory.fail_loads(0);
        let engine: Arc<dyn RenderingEngine> = memory.clone();
        assert!(SectionLease::acquire(&engine, 0).await.is_err());
        assert_eq!(memory.load_count(), 1);
        assert_eq!(memory.unload_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_still_unloads() {
        let memory = Arc::new(engine_with(&[&["one"]]).with_load_delay(Duration::from_millis(100)));
        let engine: Arc<dyn RenderingEngine> = memory.clone();

        let pending = SectionLease::acquire(&engine, 0);
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(memory.load_count(), 1);
        assert_eq!(memory.unload_count(), 1);
    }

    #[tokio::test]
    async fn test_display_at_renders_target() {
        let engine = engine_with(&[&["one"], &["two"]]);
        engine.render(0);
        let pid = engine.position_for_text(1, "two").unwrap();
        engine.display_at(&pid).await.unwrap();
        assert_eq!(engine.displayed().as_deref(), Some(pid.as_str()));
        let rendered: Vec<usize> = engine.rendered_sections().iter().map(|s| s.index()).collect();
        assert_eq!(rendered, vec![1]);

        assert!(engine.display_at("bogus").await.is_err());
    }

    #[test]
    fn test_decorations_and_activation() {
        let engine = engine_with(&[&["one"]]);
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&clicks);
        let decoration = Decoration {
            kind: DecorationKind::Highlight,
            position_id: "p1".to_string(),
            style_class: "ll-highlight ll-highlight-yellow".to_string(),
        };
        engine.add_decoration(
            decoration.clone(),
            Arc::new(move |_: ScreenAnchor| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(engine.activate("p1", DecorationKind::Highlight, ScreenAnchor::default()));
        assert!(!engine.activate("p1", DecorationKind::Underline, ScreenAnchor::default()));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(engine.decorations(), vec![decoration]);

        engine.remove_decoration("p1", DecorationKind::Highlight);
        assert_eq!(engine.decoration_count(), 0);
        assert_eq!(engine.take_decoration_ops().len(), 2);
        assert!(engine.decoration_ops().is_empty());
    }

    #[tokio::test]
    async fn test_unmounted_section_hands_out_no_document() {
        let memory = Arc::new(engine_with(&[&["one two"]]));
        let pid = memory.position_for_text(0, "two").unwrap();
        memory.render(0);
        memory.unmount(0);

        let rendered = memory.rendered_sections();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].document().is_none());
        assert!(memory.resolve_position(&pid).is_none());

        let engine: Arc<dyn RenderingEngine> = memory.clone();
        let lease = SectionLease::acquire(&engine, 0).await.unwrap();
        assert!(lease.handle().document().is_none());
        drop(lease);

        memory.remount(0);
        assert_eq!(memory.resolve_position(&pid).unwrap().text, "two");
    }

    #[test]
    fn test_idref_carried_into_positions() {
        let engine = engine_with(&[&["one"], &["two words"]]);
        engine.set_idref(1, "ch2");
        let pid = engine.position_for_text(1, "words").unwrap();
        assert!(pid.starts_with("epubcfi(/6/4[ch2]!"));
        assert_eq!(engine.spine()[1].idref.as_deref(), Some("ch2"));

        engine.render(1);
        assert_eq!(engine.resolve_position(&pid).unwrap().text, "words");
    }

    #[test]
    fn test_failing_positions() {
        let engine = engine_with(&[&["one two"]]);
        engine.fail_positions(0);
        assert!(engine.position_for_text(0, "two").is_none());
    }

    #[test]
    fn test_replace_section_changes_resolution() {
        let engine = engine_with(&[&["alpha beta"]]);
        engine.render(0);
        let pid = engine.position_for_text(0, "beta").unwrap();
        engine
            .replace_section(0, "<html><body><p>gamma</p><p>alpha beta</p></body></html>")
            .unwrap();
        assert_ne!(engine.resolve_position(&pid).map(|r| r.text).as_deref(), Some("beta"));
    }
}
