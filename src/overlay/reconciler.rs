//! Desired vs applied overlay diffing

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{OverlayEntry, OverlayInputs, OverlayKey, ReconcileReport};
use crate::anchor::AnchorResolver;
use crate::annotations::{Annotation, AnnotationKind};
use crate::callbacks::ReaderCallbacks;
use crate::config::{EngineConfig, OverlayConfig};
use crate::engine::{ActivateHandler, Decoration, DecorationKind, RenderingEngine, ScreenAnchor};

/// Owns the applied overlay state and the anchor cache
pub struct AnnotationReconciler {
    engine: Arc<dyn RenderingEngine>,
    resolver: AnchorResolver,
    config: OverlayConfig,
    callbacks: ReaderCallbacks,
    applied: BTreeMap<OverlayKey, OverlayEntry>,
    /// Latest annotation records by id, read by marker handlers when they fire
    live: Arc<RwLock<HashMap<String, Annotation>>>,
}

impl AnnotationReconciler {
    pub fn new(engine: Arc<dyn RenderingEngine>, config: &EngineConfig, callbacks: ReaderCallbacks) -> Self {
        Self {
            resolver: AnchorResolver::new(Arc::clone(&engine), &config.matching),
            engine,
            config: config.overlay.clone(),
            callbacks,
            applied: BTreeMap::new(),
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bring the drawn decorations in line with `inputs`
    pub async fn reconcile(&mut self, inputs: &OverlayInputs) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let desired = self.desired_state(inputs, &mut report).await;

        *self.live.write() = inputs
            .annotations
            .iter()
            .map(|a| (a.id.clone(), a.clone()))
            .collect();

        // Removals first so a re-add never gets taken down by a later remove
        let mut to_add = Vec::new();
        for (key, old) in &self.applied {
            match desired.get(key) {
                Some(new) if new.same_drawing(old) => report.unchanged += 1,
                Some(_) => {
                    self.engine.remove_decoration(&old.position_id, old.kind);
                    to_add.push(key.clone());
                    report.updated += 1;
                }
                None => {
                    self.engine.remove_decoration(&old.position_id, old.kind);
                    report.removed += 1;
                }
            }
        }
        for key in desired.keys() {
            if !self.applied.contains_key(key) {
                to_add.push(key.clone());
                report.added += 1;
            }
        }

        for key in to_add {
            if let Some(entry) = desired.get(&key) {
                let decoration = Decoration {
                    kind: entry.kind,
                    position_id: entry.position_id.clone(),
                    style_class: entry.style_class.clone(),
                };
                let handler = self.handler_for(&key);
                self.engine.add_decoration(decoration, handler);
            }
        }

        let previous = self.applied.len();
        self.applied = desired;
        if self.applied.len() != previous {
            self.callbacks.overlay_count_changed(self.applied.len());
        }

        debug!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            unchanged = report.unchanged,
            "Overlay reconciled"
        );
        report
    }

    /// Remove every drawn decoration and forget cached anchors
    pub fn clear(&mut self) {
        for entry in self.applied.values() {
            self.engine.remove_decoration(&entry.position_id, entry.kind);
        }
        let had_entries = !self.applied.is_empty();
        self.applied.clear();
        self.live.write().clear();
        self.resolver.reset();
        if had_entries {
            self.callbacks.overlay_count_changed(0);
        }
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn applied(&self) -> impl Iterator<Item = (&OverlayKey, &OverlayEntry)> {
        self.applied.iter()
    }

    pub fn resolver(&self) -> &AnchorResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut AnchorResolver {
        &mut self.resolver
    }

    async fn desired_state(
        &mut self,
        inputs: &OverlayInputs,
        report: &mut ReconcileReport,
    ) -> BTreeMap<OverlayKey, OverlayEntry> {
        let mut desired = BTreeMap::new();
        // The renderer keys drawings by position and kind
        let mut drawn = HashSet::new();

        for annotation in &inputs.annotations {
            let resolved = self.resolver.resolve(annotation).await;
            if !resolved.is_verified() {
                report.unverified += 1;
            }

            let active = inputs.active_annotation.as_deref() == Some(annotation.id.as_str());
            let kind = decoration_kind(annotation.kind);
            if !drawn.insert((resolved.position_id.clone(), kind)) {
                debug!(annotation = %annotation.id, "Another annotation already draws this position");
                continue;
            }

            desired.insert(
                OverlayKey::Annotation(annotation.id.clone()),
                OverlayEntry {
                    position_id: resolved.position_id,
                    kind,
                    style_key: style_key(annotation.color_or_default(), active, &inputs.layout_signature),
                    style_class: self.annotation_class(annotation, active),
                },
            );
        }

        for result in &inputs.search_results {
            if !drawn.insert((result.position_id.clone(), DecorationKind::SearchMatch)) {
                continue;
            }
            desired.insert(
                OverlayKey::SearchResult(result.position_id.clone()),
                OverlayEntry {
                    position_id: result.position_id.clone(),
                    kind: DecorationKind::SearchMatch,
                    style_key: style_key("search", false, &inputs.layout_signature),
                    style_class: self.config.search_class.clone(),
                },
            );
        }

        desired
    }

    fn annotation_class(&self, annotation: &Annotation, active: bool) -> String {
        let prefix = &self.config.class_prefix;
        let mut class = match annotation.kind {
            AnnotationKind::Bookmark => format!("{}-bookmark", prefix),
            AnnotationKind::Note => format!("{} {}-note {}-{}", prefix, prefix, prefix, annotation.color_or_default()),
            AnnotationKind::Highlight => format!("{} {}-{}", prefix, prefix, annotation.color_or_default()),
        };
        if active {
            class.push(' ');
            class.push_str(&self.config.active_class);
        }
        class
    }

    fn handler_for(&self, key: &OverlayKey) -> ActivateHandler {
        let callbacks = self.callbacks.clone();
        match key {
            OverlayKey::Annotation(id) => {
                let id = id.clone();
                let live = Arc::clone(&self.live);
                Arc::new(move |anchor: ScreenAnchor| {
                    let annotation = live.read().get(&id).cloned();
                    if let Some(annotation) = annotation {
                        callbacks.annotation_marker_activated(&annotation, anchor);
                    }
                })
            }
            OverlayKey::SearchResult(position_id) => {
                let position_id = position_id.clone();
                Arc::new(move |_: ScreenAnchor| callbacks.search_result_activated(&position_id))
            }
        }
    }
}

fn decoration_kind(kind: AnnotationKind) -> DecorationKind {
    match kind {
        AnnotationKind::Highlight => DecorationKind::Highlight,
        AnnotationKind::Note => DecorationKind::Underline,
        AnnotationKind::Bookmark => DecorationKind::Bookmark,
    }
}

fn style_key(color: &str, active: bool, layout: &str) -> String {
    let emphasis = if active { "active" } else { "" };
    format!("{}|{}|{}", color, emphasis, layout)
}
