//! Full-text search across the spine
//!
//! Scans linear sections in reading order, loading each one only for as long as it is being
//! searched. Matching is case and diacritic insensitive. A newer search supersedes the
//! running one, which stops at its next section boundary and commits nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::engine::{RenderingEngine, SectionHandle, SectionLease};
use crate::error::{AnchorError, Result};
use crate::matcher::range_for_span;
use crate::normalize::{find_all, fold, fold_str, FoldOptions};
use crate::text_index::build_index;
use crate::token::{Channel, OperationOutcome, OperationToken, OperationTokens};

/// A search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Position id of the match
    pub position_id: String,
    /// The chapter href
    pub href: String,
    /// Spine index
    pub spine_index: usize,
    /// Text excerpt around the match
    pub excerpt: String,
}

/// Runs searches on the search token channel
pub struct SearchCoordinator {
    engine: Arc<dyn RenderingEngine>,
    tokens: Arc<OperationTokens>,
    config: SearchConfig,
}

impl SearchCoordinator {
    pub fn new(engine: Arc<dyn RenderingEngine>, tokens: Arc<OperationTokens>, config: SearchConfig) -> Self {
        Self {
            engine,
            tokens,
            config,
        }
    }

    /// Search the book for `query`
    pub async fn search(&self, query: &str) -> OperationOutcome<Vec<SearchResult>> {
        let token = self.tokens.next_token(Channel::Search);
        let needle = fold_str(query, FoldOptions::SEARCH);
        let mut results = Vec::new();

        if needle.is_empty() {
            return self.commit(token, results);
        }

        for item in self.engine.spine().into_iter().filter(|item| item.linear) {
            if !self.tokens.is_current(Channel::Search, token) {
                debug!(query, "Search superseded");
                return OperationOutcome::Superseded;
            }

            let lease = match SectionLease::acquire(&self.engine, item.index).await {
                Ok(lease) => lease,
                Err(e) => {
                    warn!(section = item.index, href = %item.href, error = %e, "Skipping section in search");
                    continue;
                }
            };
            if !self.tokens.is_current(Channel::Search, token) {
                debug!(query, "Search superseded");
                return OperationOutcome::Superseded;
            }

            let remaining = self.config.max_results - results.len();
            match self.search_section(lease.handle().as_ref(), &needle, remaining) {
                Ok(found) => results.extend(found),
                Err(e) => {
                    warn!(section = item.index, href = %item.href, error = %e, "Skipping section in search");
                }
            }
            drop(lease);

            if results.len() >= self.config.max_results {
                debug!(query, limit = self.config.max_results, "Search result limit reached");
                break;
            }
        }

        let outcome = self.commit(token, results);
        if let OperationOutcome::Committed(found) = &outcome {
            info!(query, results = found.len(), "Search complete");
        }
        outcome
    }

    /// Supersede any running search
    pub fn cancel(&self) {
        self.tokens.channel(Channel::Search).invalidate();
    }

    fn commit(&self, token: OperationToken, results: Vec<SearchResult>) -> OperationOutcome<Vec<SearchResult>> {
        if self.tokens.is_current(Channel::Search, token) {
            OperationOutcome::Committed(results)
        } else {
            OperationOutcome::Superseded
        }
    }

    fn search_section(&self, section: &dyn SectionHandle, needle: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let doc = section
            .document()
            .ok_or(AnchorError::SectionUnavailable(section.index()))?;
        let index = build_index(&doc);
        let folded = fold(&index.flat_text, FoldOptions::SEARCH);
        let chars: Vec<char> = index.flat_text.chars().collect();

        let mut results = Vec::new();
        let mut last_end = 0;
        for (start, end) in find_all(&folded.text, needle) {
            if results.len() >= limit {
                break;
            }
            // Move past this match
            if start < last_end {
                continue;
            }
            last_end = end;

            let Some((source_start, source_end)) = folded.source_span(start, end) else {
                continue;
            };
            let Some(range) = range_for_span(&index, source_start, source_end) else {
                continue;
            };
            let position_id = match section.position_from_range(&range) {
                Ok(id) => id,
                Err(e) => {
                    debug!(section = section.index(), error = %e, "Search hit has no position id");
                    continue;
                }
            };

            results.push(SearchResult {
                position_id,
                href: section.href().to_string(),
                spine_index: section.index(),
                excerpt: create_excerpt(
                    &chars,
                    source_start,
                    source_end - source_start,
                    self.config.excerpt_context_chars,
                ),
            });
        }
        Ok(results)
    }
}

/// Create an excerpt around a match position, widened to word boundaries
fn create_excerpt(text: &[char], position: usize, match_len: usize, context: usize) -> String {
    let start = position.saturating_sub(context).min(text.len());
    let end = (position + match_len + context).min(text.len());

    // Find word boundaries
    let start = text[..start]
        .iter()
        .rposition(|c| c.is_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    let end = text[end..]
        .iter()
        .position(|c| c.is_whitespace())
        .map(|i| end + i)
        .unwrap_or(end);

    let excerpt: String = text[start..end].iter().collect();

    // Add ellipsis if truncated
    let prefix = if start > 0 { "..." } else { "" };
    let suffix = if end < text.len() { "..." } else { "" };

    format!("{}{}{}", prefix, excerpt.trim(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::engine::MemoryEngine;
    use std::time::Duration;

    fn coordinator(engine: &Arc<MemoryEngine>, config: SearchConfig) -> SearchCoordinator {
        SearchCoordinator::new(engine.clone(), Arc::new(OperationTokens::new()), config)
    }

    fn book(sections: &[&str]) -> Arc<MemoryEngine> {
        let engine = MemoryEngine::new();
        for (i, text) in sections.iter().enumerate() {
            engine.add_document(&format!("ch{}.xhtml", i + 1), Document::from_paragraphs(&[*text]));
        }
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_diacritic_insensitive_hits_in_spine_order() {
        let engine = book(&["A café on the corner.", "No match.", "Another CAFE here."]);
        let search = coordinator(&engine, SearchConfig::default());

        let results = search.search("cafe").await.committed().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].href, "ch1.xhtml");
        assert_eq!(results[1].spine_index, 2);

        engine.render(0);
        let resolved = engine.resolve_position(&results[0].position_id).unwrap();
        assert_eq!(resolved.text, "café");
        assert_eq!(engine.load_count(), engine.unload_count());
    }

    #[tokio::test]
    async fn test_non_linear_sections_skipped() {
        let engine = book(&["needle one", "needle notes"]);
        engine.set_linear(1, false);
        let search = coordinator(&engine, SearchConfig::default());

        let results = search.search("needle").await.committed().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(engine.load_count(), 1);
    }

    #[tokio::test]
    async fn test_result_cap() {
        let engine = book(&["word word word", "word word"]);
        let search = coordinator(
            &engine,
            SearchConfig {
                max_results: 3,
                ..SearchConfig::default()
            },
        );
        let results = search.search("word").await.committed().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(engine.load_count(), 1);
        assert_eq!(engine.unload_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_commits_nothing_found() {
        let engine = book(&["text"]);
        let search = coordinator(&engine, SearchConfig::default());
        assert_eq!(search.search("  ").await, OperationOutcome::Committed(Vec::new()));
        assert_eq!(engine.load_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_search_supersedes() {
        let memory = MemoryEngine::new().with_load_delay(Duration::from_millis(20));
        for i in 0..4 {
            memory.add_document(&format!("ch{i}.xhtml"), Document::from_paragraphs(&["the river bends"]));
        }
        let engine = Arc::new(memory);
        let search = Arc::new(coordinator(&engine, SearchConfig::default()));

        let first = {
            let search = Arc::clone(&search);
            tokio::spawn(async move { search.search("river").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = search.search("bends").await;

        assert_eq!(first.await.unwrap(), OperationOutcome::Superseded);
        assert_eq!(second.committed().map(|r| r.len()), Some(4));
        // The second search loaded all four; the first stopped after its second section
        assert_eq!(engine.load_count() - 4, 2);
        assert_eq!(engine.load_count(), engine.unload_count());
        assert!(engine.loaded_sections().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_at_next_section_boundary() {
        let memory = MemoryEngine::new().with_load_delay(Duration::from_millis(20));
        for i in 0..4 {
            memory.add_document(&format!("ch{i}.xhtml"), Document::from_paragraphs(&["the river bends"]));
        }
        let engine = Arc::new(memory);
        let search = Arc::new(coordinator(&engine, SearchConfig::default()));

        let running = {
            let search = Arc::clone(&search);
            tokio::spawn(async move { search.search("river").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        search.cancel();

        assert_eq!(running.await.unwrap(), OperationOutcome::Superseded);
        assert_eq!(engine.load_count(), 2);
        assert_eq!(engine.unload_count(), 2);
    }

    #[tokio::test]
    async fn test_unmounted_section_skipped() {
        let engine = book(&["a lantern by the door", "a lantern in the hall", "a lantern on the quay"]);
        engine.unmount(1);
        let search = coordinator(&engine, SearchConfig::default());

        let results = search.search("lantern").await.committed().unwrap();
        let sections: Vec<usize> = results.iter().map(|r| r.spine_index).collect();
        assert_eq!(sections, vec![0, 2]);
        assert_eq!(engine.load_count(), 3);
        assert_eq!(engine.unload_count(), 3);
    }

    #[test]
    fn test_create_excerpt() {
        let text: Vec<char> = "one two three four five six".chars().collect();
        assert_eq!(create_excerpt(&text, 8, 5, 3), "...two three four...");
        assert_eq!(create_excerpt(&text, 0, 3, 100), "one two three four five six");
    }
}
