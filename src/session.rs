//! Reader session
//!
//! One session per opened book. Ties the rendering engine to the overlay machinery, search,
//! lookups and the application callbacks, and tears all of it down together.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::annotations::Annotation;
use crate::callbacks::{FootnotePreview, ReaderCallbacks, SelectionEvent};
use crate::cfi::{compare, ranges_overlap, try_parse};
use crate::config::EngineConfig;
use crate::dom::{Document, NodeId};
use crate::engine::{href_matches, RenderingEngine, ScreenAnchor, SectionLease};
use crate::error::Result;
use crate::lookup::{LookupCoordinator, LookupError, LookupProvider, LookupResponse};
use crate::normalize::collapse_whitespace;
use crate::overlay::{AnnotationReconciler, OverlayInputs, ReconcileReport, ReconcileScheduler};
use crate::search::{SearchCoordinator, SearchResult};
use crate::token::{OperationOutcome, OperationTokens};

pub struct ReaderSession {
    engine: Arc<dyn RenderingEngine>,
    callbacks: ReaderCallbacks,
    tokens: Arc<OperationTokens>,
    reconciler: Arc<Mutex<AnnotationReconciler>>,
    scheduler: ReconcileScheduler,
    search: SearchCoordinator,
    lookup: Option<LookupCoordinator>,
}

impl ReaderSession {
    /// Create a session; spawns the reconcile worker on the current runtime
    pub fn new(engine: Arc<dyn RenderingEngine>, config: EngineConfig) -> Self {
        let callbacks = ReaderCallbacks::new();
        let tokens = Arc::new(OperationTokens::new());
        let reconciler = Arc::new(Mutex::new(AnnotationReconciler::new(
            Arc::clone(&engine),
            &config,
            callbacks.clone(),
        )));
        let scheduler = ReconcileScheduler::spawn(Arc::clone(&reconciler), config.debounce());
        let search = SearchCoordinator::new(Arc::clone(&engine), Arc::clone(&tokens), config.search.clone());

        Self {
            engine,
            callbacks,
            tokens,
            reconciler,
            scheduler,
            search,
            lookup: None,
        }
    }

    pub fn with_lookup_provider(mut self, provider: Arc<dyn LookupProvider>) -> Self {
        self.lookup = Some(LookupCoordinator::new(provider, Arc::clone(&self.tokens)));
        self
    }

    pub fn callbacks(&self) -> &ReaderCallbacks {
        &self.callbacks
    }

    pub fn engine(&self) -> &Arc<dyn RenderingEngine> {
        &self.engine
    }

    pub fn reconciler(&self) -> &Arc<Mutex<AnnotationReconciler>> {
        &self.reconciler
    }

    /// Debounced overlay update
    pub fn update_overlay(&self, inputs: OverlayInputs) {
        self.scheduler.schedule(inputs);
    }

    /// Reconcile immediately; waits for a pass already in progress
    pub async fn reconcile_now(&self, inputs: &OverlayInputs) -> ReconcileReport {
        self.reconciler.lock().await.reconcile(inputs).await
    }

    /// Completed debounced passes
    pub fn pass_count(&self) -> usize {
        self.scheduler.pass_count()
    }

    pub async fn search(&self, query: &str) -> OperationOutcome<Vec<SearchResult>> {
        self.search.search(query).await
    }

    pub fn cancel_search(&self) {
        self.search.cancel();
    }

    /// Navigate to a search hit and tell the application
    pub async fn activate_search_result(&self, position_id: &str) -> Result<()> {
        self.engine.display_at(position_id).await?;
        self.callbacks.search_result_activated(position_id);
        Ok(())
    }

    /// Report a reader selection, flagging it when it falls on an existing annotation
    pub async fn handle_selection(
        &self,
        text: &str,
        position_id: &str,
        anchor: ScreenAnchor,
        annotations: &[Annotation],
    ) -> SelectionEvent {
        let existing = self.annotation_at(position_id, annotations).await;
        let event = SelectionEvent {
            text: text.to_string(),
            position_id: position_id.to_string(),
            anchor,
            is_existing_annotation: existing.is_some(),
            annotation_id: existing,
        };
        debug!(position = %position_id, existing = event.is_existing_annotation, "Selection changed");
        self.callbacks.selection_changed(event.clone());
        event
    }

    /// Look up footnote content behind a link like `notes.xhtml#fn3` and show it
    pub async fn request_footnote_preview(&self, href: &str, anchor: ScreenAnchor) -> Option<FootnotePreview> {
        let preview = self.footnote(href, anchor).await;
        self.callbacks.footnote_preview_requested(preview.clone());
        preview
    }

    pub async fn define(&self, word: &str) -> OperationOutcome<std::result::Result<LookupResponse, LookupError>> {
        match &self.lookup {
            Some(lookup) => lookup.define(word).await,
            None => OperationOutcome::Committed(Err(LookupError::ProviderNotAvailable("dictionary".to_string()))),
        }
    }

    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> OperationOutcome<std::result::Result<LookupResponse, LookupError>> {
        match &self.lookup {
            Some(lookup) => lookup.translate(text, target_language).await,
            None => OperationOutcome::Committed(Err(LookupError::ProviderNotAvailable("translation".to_string()))),
        }
    }

    /// Document teardown: drop queued overlay inputs, supersede in-flight work, take the
    /// overlay down, forget anchors
    pub async fn reset(&self) {
        self.scheduler.invalidate_pending();
        self.tokens.invalidate_all();
        self.reconciler.lock().await.clear();
        info!("Reader session reset");
    }

    /// Stop the reconcile worker after any pending pass
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }

    async fn annotation_at(&self, position_id: &str, annotations: &[Annotation]) -> Option<String> {
        let selection = try_parse(position_id)?;
        let reconciler = self.reconciler.lock().await;

        // Earliest in reading order wins when annotations overlap each other
        annotations
            .iter()
            .filter_map(|annotation| {
                let current = reconciler
                    .resolver()
                    .cached(&annotation.position_id)
                    .unwrap_or(annotation.position_id.as_str());
                let cfi = try_parse(current)?;
                ranges_overlap(&cfi, &selection).then_some((cfi, annotation))
            })
            .min_by(|(a, _), (b, _)| compare(a, b))
            .map(|(_, annotation)| annotation.id.clone())
    }

    async fn footnote(&self, href: &str, anchor: ScreenAnchor) -> Option<FootnotePreview> {
        let (path, fragment) = match href.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (href, None),
        };
        let index = self
            .engine
            .spine()
            .into_iter()
            .find(|item| href_matches(&item.href, path))?
            .index;

        let lease = match SectionLease::acquire(&self.engine, index).await {
            Ok(lease) => lease,
            Err(e) => {
                debug!(href, error = %e, "Footnote section did not load");
                return None;
            }
        };
        let doc = lease.handle().document()?;

        let node = match fragment {
            Some(id) => find_by_id(&doc, id)?,
            None => doc.content_root()?,
        };
        let content = collapse_whitespace(&doc.text_content(node));
        if content.is_empty() {
            return None;
        }

        Some(FootnotePreview {
            href: href.to_string(),
            title: doc
                .find_element("title")
                .map(|title| collapse_whitespace(&doc.text_content(title)))
                .filter(|title| !title.is_empty()),
            content,
            anchor,
        })
    }
}

fn find_by_id(doc: &Document, id: &str) -> Option<NodeId> {
    let root = doc.root()?;
    doc.descendants(root).find(|node| doc.element_id(*node) == Some(id))
}
