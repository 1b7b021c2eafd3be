//! Anchor resolution
//!
//! Turns a stored annotation into a position id that currently points at its text. Stages
//! run cheapest first and stop at the first verified hit:
//!
//! 1. **Cached**: the id this annotation last verified at
//! 2. **Original**: the id stored with the annotation
//! 3. **RenderedSearch**: quote matching in every rendered section, capturing section first
//! 4. **LazySearch**: quote matching in the capturing section, loaded just for this
//! 5. **Fallback**: the stored id, unverified
//!
//! A resolution never fails. An annotation whose text cannot be found still gets its
//! stored id so the overlay keeps it; the miss is logged.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::annotations::Annotation;
use crate::config::MatchConfig;
use crate::engine::{href_matches, RenderingEngine, SectionHandle, SectionLease};
use crate::matcher::QuoteMatcher;
use crate::normalize::{fold_str, FoldOptions};
use crate::text_index::build_index;

/// Which stage produced a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionStage {
    Cached,
    Original,
    RenderedSearch,
    LazySearch,
    Fallback,
}

/// A resolved position id and how it was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPosition {
    pub position_id: String,
    pub stage: ResolutionStage,
}

impl ResolvedPosition {
    /// False only for the fallback, whose text was never confirmed
    pub fn is_verified(&self) -> bool {
        self.stage != ResolutionStage::Fallback
    }
}

/// Counters for observing resolver work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverStats {
    pub cache_hits: usize,
    pub original_hits: usize,
    pub rendered_hits: usize,
    pub lazy_hits: usize,
    pub fallbacks: usize,
    /// Sections whose text was indexed and matched
    pub sections_scanned: usize,
    pub sections_loaded: usize,
}

/// Resolves annotations against a rendering engine, caching verified positions
pub struct AnchorResolver {
    engine: Arc<dyn RenderingEngine>,
    /// Stored position id -> last verified position id
    cache: HashMap<String, String>,
    matcher: QuoteMatcher,
    min_containment_chars: usize,
    stats: ResolverStats,
}

impl AnchorResolver {
    pub fn new(engine: Arc<dyn RenderingEngine>, config: &MatchConfig) -> Self {
        Self {
            engine,
            cache: HashMap::new(),
            matcher: QuoteMatcher::new(config.clone()),
            min_containment_chars: config.min_containment_chars,
            stats: ResolverStats::default(),
        }
    }

    pub async fn resolve(&mut self, annotation: &Annotation) -> ResolvedPosition {
        let stored = annotation.position_id.as_str();

        if let Some(cached) = self.cache.get(stored).cloned() {
            if self.verify(&cached, &annotation.text) {
                self.stats.cache_hits += 1;
                debug!(annotation = %annotation.id, position = %cached, "Anchor resolved from cache");
                return ResolvedPosition {
                    position_id: cached,
                    stage: ResolutionStage::Cached,
                };
            }
            debug!(annotation = %annotation.id, "Cached anchor no longer verifies");
        }

        if self.verify(stored, &annotation.text) {
            self.stats.original_hits += 1;
            debug!(annotation = %annotation.id, "Anchor resolved at stored position");
            return self.remember(stored, stored.to_string(), ResolutionStage::Original);
        }

        if let Some(found) = self.search_rendered(annotation) {
            self.stats.rendered_hits += 1;
            debug!(annotation = %annotation.id, position = %found, "Anchor recovered in rendered sections");
            return self.remember(stored, found, ResolutionStage::RenderedSearch);
        }

        if let Some(found) = self.search_capturing_section(annotation).await {
            self.stats.lazy_hits += 1;
            debug!(annotation = %annotation.id, position = %found, "Anchor recovered in loaded section");
            return self.remember(stored, found, ResolutionStage::LazySearch);
        }

        self.stats.fallbacks += 1;
        warn!(
            annotation = %annotation.id,
            position = %stored,
            chapter = ?annotation.chapter_href,
            "Could not verify anchor, using stored position"
        );
        ResolvedPosition {
            position_id: stored.to_string(),
            stage: ResolutionStage::Fallback,
        }
    }

    /// Forget every cached position, as on document teardown
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn cached(&self, stored_position_id: &str) -> Option<&str> {
        self.cache.get(stored_position_id).map(String::as_str)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    fn remember(&mut self, stored: &str, position_id: String, stage: ResolutionStage) -> ResolvedPosition {
        self.cache.insert(stored.to_string(), position_id.clone());
        ResolvedPosition { position_id, stage }
    }

    /// True when `position_id` resolves to text agreeing with `quote`
    fn verify(&self, position_id: &str, quote: &str) -> bool {
        match self.engine.resolve_position(position_id) {
            Some(resolved) => texts_agree(&resolved.text, quote, self.min_containment_chars),
            None => false,
        }
    }

    fn search_rendered(&mut self, annotation: &Annotation) -> Option<String> {
        let mut sections = self.engine.rendered_sections();
        if let Some(chapter) = annotation.chapter_href.as_deref() {
            sections.sort_by_key(|s| !href_matches(s.href(), chapter));
        }

        sections
            .iter()
            .find_map(|section| self.match_in_section(section.as_ref(), annotation))
    }

    /// Load the capturing section if it is not on screen and match there
    async fn search_capturing_section(&mut self, annotation: &Annotation) -> Option<String> {
        let chapter = annotation.chapter_href.as_deref()?;
        let already_searched = self
            .engine
            .rendered_sections()
            .iter()
            .any(|s| href_matches(s.href(), chapter));
        if already_searched {
            return None;
        }

        let index = self
            .engine
            .spine()
            .into_iter()
            .find(|item| href_matches(&item.href, chapter))?
            .index;

        let lease = match SectionLease::acquire(&self.engine, index).await {
            Ok(lease) => lease,
            Err(e) => {
                warn!(section = index, error = %e, "Failed to load section for anchoring");
                return None;
            }
        };
        self.stats.sections_loaded += 1;

        self.match_in_section(lease.handle().as_ref(), annotation)
    }

    fn match_in_section(&mut self, section: &dyn SectionHandle, annotation: &Annotation) -> Option<String> {
        // Not mounted right now; try the next candidate
        let doc = section.document()?;
        self.stats.sections_scanned += 1;

        let index = build_index(&doc);
        let range = self.matcher.find_best_range(
            &index,
            &annotation.text,
            annotation.context_prefix.as_deref(),
            annotation.context_suffix.as_deref(),
        )?;

        let position_id = match section.position_from_range(&range) {
            Ok(id) => id,
            Err(e) => {
                debug!(section = section.index(), error = %e, "Matched range has no position id");
                return None;
            }
        };

        self.verify(&position_id, &annotation.text).then_some(position_id)
    }
}

/// Compare resolved text with the stored quote after folding.
///
/// Equal text always agrees. Containment in either direction agrees only when the shorter
/// side has at least `min_containment` chars. An empty quote agrees with any resolved
/// position.
pub fn texts_agree(found: &str, quote: &str, min_containment: usize) -> bool {
    let found = fold_str(found, FoldOptions::QUOTE);
    let quote = fold_str(quote, FoldOptions::QUOTE);
    if quote.is_empty() {
        return true;
    }
    if found == quote {
        return true;
    }

    let (shorter, longer) = if found.len() <= quote.len() {
        (&found, &quote)
    } else {
        (&quote, &found)
    };
    !shorter.is_empty() && shorter.chars().count() >= min_containment && longer.contains(shorter.as_str())
}
