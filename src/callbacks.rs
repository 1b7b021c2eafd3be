//! Callbacks from the engine up to the application
//!
//! Decoration handlers are installed once per decoration but the application may swap its
//! callbacks at any time. Handlers therefore capture a [`CallbackCell`] and read it when they
//! fire, so they always reach the latest callback.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::annotations::Annotation;
use crate::engine::ScreenAnchor;

/// A shared slot holding the current callback
pub struct CallbackCell<F: ?Sized> {
    slot: Arc<RwLock<Option<Arc<F>>>>,
}

impl<F: ?Sized> CallbackCell<F> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set(&self, callback: Arc<F>) {
        *self.slot.write() = Some(callback);
    }

    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// The callback installed right now
    pub fn get(&self) -> Option<Arc<F>> {
        self.slot.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().is_some()
    }
}

impl<F: ?Sized> Clone for CallbackCell<F> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<F: ?Sized> Default for CallbackCell<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for CallbackCell<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCell")
            .field("set", &self.is_set())
            .finish()
    }
}

/// A reader selection, with whether it lands on an existing annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEvent {
    pub text: String,
    pub position_id: String,
    pub anchor: ScreenAnchor,
    pub is_existing_annotation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<String>,
}

/// Footnote content shown in a popup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FootnotePreview {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub anchor: ScreenAnchor,
}

pub type SelectionCallback = dyn Fn(SelectionEvent) + Send + Sync;
pub type SearchActivatedCallback = dyn Fn(&str) + Send + Sync;
pub type MarkerCallback = dyn Fn(&Annotation, ScreenAnchor) + Send + Sync;
pub type FootnoteCallback = dyn Fn(Option<FootnotePreview>) + Send + Sync;
pub type OverlayCountCallback = dyn Fn(usize) + Send + Sync;

/// Every application callback, one cell each
#[derive(Debug, Clone, Default)]
pub struct ReaderCallbacks {
    pub selection_changed: CallbackCell<SelectionCallback>,
    pub search_result_activated: CallbackCell<SearchActivatedCallback>,
    pub annotation_marker_activated: CallbackCell<MarkerCallback>,
    pub footnote_preview_requested: CallbackCell<FootnoteCallback>,
    pub overlay_count_changed: CallbackCell<OverlayCountCallback>,
}

impl ReaderCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_selection_changed(&self, f: impl Fn(SelectionEvent) + Send + Sync + 'static) {
        self.selection_changed.set(Arc::new(f));
    }

    pub fn on_search_result_activated(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.search_result_activated.set(Arc::new(f));
    }

    pub fn on_annotation_marker_activated(
        &self,
        f: impl Fn(&Annotation, ScreenAnchor) + Send + Sync + 'static,
    ) {
        self.annotation_marker_activated.set(Arc::new(f));
    }

    pub fn on_footnote_preview_requested(
        &self,
        f: impl Fn(Option<FootnotePreview>) + Send + Sync + 'static,
    ) {
        self.footnote_preview_requested.set(Arc::new(f));
    }

    pub fn on_overlay_count_changed(&self, f: impl Fn(usize) + Send + Sync + 'static) {
        self.overlay_count_changed.set(Arc::new(f));
    }

    pub fn selection_changed(&self, event: SelectionEvent) {
        if let Some(callback) = self.selection_changed.get() {
            callback(event);
        }
    }

    pub fn search_result_activated(&self, position_id: &str) {
        if let Some(callback) = self.search_result_activated.get() {
            callback(position_id);
        }
    }

    pub fn annotation_marker_activated(&self, annotation: &Annotation, anchor: ScreenAnchor) {
        if let Some(callback) = self.annotation_marker_activated.get() {
            callback(annotation, anchor);
        }
    }

    pub fn footnote_preview_requested(&self, preview: Option<FootnotePreview>) {
        if let Some(callback) = self.footnote_preview_requested.get() {
            callback(preview);
        }
    }

    pub fn overlay_count_changed(&self, count: usize) {
        if let Some(callback) = self.overlay_count_changed.get() {
            callback(count);
        }
    }

    /// Drop every callback
    pub fn clear(&self) {
        self.selection_changed.clear();
        self.search_result_activated.clear();
        self.annotation_marker_activated.clear();
        self.footnote_preview_requested.clear();
        self.overlay_count_changed.clear();
    }
}
