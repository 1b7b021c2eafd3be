//! Overlay reconciliation
//!
//! The application describes the overlay it wants (annotations, search hits, which
//! annotation is emphasized) and the reconciler works out the smallest set of decoration
//! add/remove calls that brings the renderer there. Decorations that did not change are
//! never touched, so nothing flickers.
//!
//! ```text
//! OverlayInputs ──► ReconcileScheduler ──(debounce)──► AnnotationReconciler
//!                                                        │  resolve (AnchorResolver)
//!                                                        │  desired vs applied
//!                                                        ▼
//!                                         RenderingEngine add/remove_decoration
//! ```

mod reconciler;
mod scheduler;

use serde::{Deserialize, Serialize};

use crate::annotations::Annotation;
use crate::engine::DecorationKind;
use crate::search::SearchResult;

pub use reconciler::AnnotationReconciler;
pub use scheduler::ReconcileScheduler;

/// Everything the overlay should show
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayInputs {
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub search_results: Vec<SearchResult>,
    /// Id of the emphasized annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_annotation: Option<String>,
    /// Changes whenever layout changes (font size, column count); part of every style key
    #[serde(default)]
    pub layout_signature: String,
}

/// Overlay identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayKey {
    Annotation(String),
    SearchResult(String),
}

/// One drawn or to-be-drawn decoration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub position_id: String,
    pub kind: DecorationKind,
    /// color | emphasis | layout
    pub style_key: String,
    pub style_class: String,
}

impl OverlayEntry {
    /// True when redrawing `self` over `other` would change nothing
    pub fn same_drawing(&self, other: &OverlayEntry) -> bool {
        self.position_id == other.position_id && self.kind == other.kind && self.style_key == other.style_key
    }
}

/// What one reconcile pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// Annotations that kept their stored, unverified position
    pub unverified: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}
