//! Quote matching against a text index
//!
//! Finds every occurrence of a folded quote in a section's flat text, ranks them by how much
//! of the stored context surrounds them, and maps the winner back to a node-level range.

use crate::config::MatchConfig;
use crate::dom::TextRange;
use crate::normalize::{find_all, fold, fold_str, FoldOptions, FoldedText};
use crate::text_index::TextIndex;

/// A scored occurrence of the quote, offsets in chars of the flat text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub start: usize,
    pub end: usize,
    pub score: u8,
}

/// Quote matcher with its tuning knobs
#[derive(Debug, Clone, Default)]
pub struct QuoteMatcher {
    config: MatchConfig,
}

impl QuoteMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Best range for `quote` in `index`, or `None` when the quote is empty, absent, or
    /// cannot be mapped back to nodes.
    pub fn find_best_range(
        &self,
        index: &TextIndex,
        quote: &str,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Option<TextRange> {
        let best = self.candidates(index, quote, prefix, suffix).into_iter().next()?;
        range_for_span(index, best.start, best.end)
    }

    /// All occurrences, best first (score descending, then earliest)
    pub fn candidates(
        &self,
        index: &TextIndex,
        quote: &str,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Vec<Candidate> {
        if index.is_empty() {
            return Vec::new();
        }
        let needle = fold_str(quote, FoldOptions::QUOTE);
        if needle.is_empty() {
            return Vec::new();
        }

        let haystack = fold(&index.flat_text, FoldOptions::QUOTE);
        let prefix = prefix
            .map(|p| fold_str(p, FoldOptions::QUOTE))
            .filter(|p| !p.is_empty());
        let suffix = suffix
            .map(|s| fold_str(s, FoldOptions::QUOTE))
            .filter(|s| !s.is_empty());

        let mut candidates: Vec<Candidate> = find_all(&haystack.text, &needle)
            .into_iter()
            .filter_map(|(start, end)| {
                let score = self.context_score(&haystack, start, end, prefix.as_deref(), suffix.as_deref());
                let (start, end) = haystack.source_span(start, end)?;
                Some(Candidate { start, end, score })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.start.cmp(&b.start)));
        candidates
    }

    fn context_score(
        &self,
        haystack: &FoldedText,
        start: usize,
        end: usize,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> u8 {
        let mut score = 0;
        if let Some(prefix) = prefix {
            let window = prefix.chars().count() + self.config.context_slack_chars;
            if tail_chars(&haystack.text[..start], window).contains(prefix) {
                score += 1;
            }
        }
        if let Some(suffix) = suffix {
            let window = suffix.chars().count() + self.config.context_slack_chars;
            if head_chars(&haystack.text[end..], window).contains(suffix) {
                score += 1;
            }
        }
        score
    }
}

/// Convenience wrapper using default tuning
pub fn find_best_range(
    index: &TextIndex,
    quote: &str,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> Option<TextRange> {
    QuoteMatcher::default().find_best_range(index, quote, prefix, suffix)
}

/// Map a flat-text char span to a node range, keeping it non-empty
pub fn range_for_span(index: &TextIndex, start: usize, end: usize) -> Option<TextRange> {
    let start_point = index.locate_start(start)?;
    let mut end_point = index.locate_end(end)?;

    if end_point.node == start_point.node && end_point.offset <= start_point.offset {
        end_point.offset = start_point.offset + 1;
    }
    Some(TextRange::new(start_point, end_point))
}

fn tail_chars(text: &str, count: usize) -> &str {
    match text.char_indices().rev().nth(count.saturating_sub(1)) {
        Some((at, _)) if count > 0 => &text[at..],
        _ if count == 0 => "",
        _ => text,
    }
}

fn head_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}
