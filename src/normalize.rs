//! Text folding for matching and search
//!
//! Quotes captured at highlight time and the text of a re-rendered section rarely agree
//! byte for byte: typographic quotes get straightened, whitespace reflows, ligatures split.
//! Folding maps both sides onto a comparable form while remembering where every folded
//! byte came from, so a match in folded text can be mapped back to source offsets.

use unicode_normalization::char::{decompose_compatible, is_combining_mark};

/// Folding switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldOptions {
    /// Drop combining marks after decomposition ("Café" matches "cafe")
    pub strip_diacritics: bool,
}

impl FoldOptions {
    /// Options used for anchoring quotes
    pub const QUOTE: Self = Self {
        strip_diacritics: false,
    };

    /// Options used for full-text search
    pub const SEARCH: Self = Self {
        strip_diacritics: true,
    };
}

/// Folded text plus a byte → source char map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedText {
    pub text: String,
    /// `origin[b]` is the source char index that produced folded byte `b`.
    /// Has one trailing entry equal to the source char count.
    origin: Vec<usize>,
}

impl FoldedText {
    /// Source char range covered by the folded byte range `start..end`
    pub fn source_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end || end > self.text.len() {
            return None;
        }
        let source_start = *self.origin.get(start)?;
        let source_end = *self.origin.get(end - 1)? + 1;
        Some((source_start, source_end))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Collapse whitespace runs into single spaces and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold `source`, keeping the origin map
pub fn fold(source: &str, options: FoldOptions) -> FoldedText {
    let mut text = String::with_capacity(source.len());
    let mut origin = Vec::with_capacity(source.len() + 1);
    let mut pending_space: Option<usize> = None;
    let mut count = 0;

    for (index, ch) in source.chars().enumerate() {
        count = index + 1;

        if ch.is_whitespace() {
            pending_space.get_or_insert(index);
            continue;
        }
        if is_invisible(ch) {
            continue;
        }

        if let Some(space_origin) = pending_space.take() {
            if !text.is_empty() {
                push_char(&mut text, &mut origin, ' ', space_origin);
            }
        }

        if let Some(replacement) = unify_glyph(ch) {
            for r in replacement.chars() {
                push_char(&mut text, &mut origin, r, index);
            }
            continue;
        }

        decompose_compatible(ch, |d| {
            if options.strip_diacritics && is_combining_mark(d) {
                return;
            }
            for lower in d.to_lowercase() {
                push_char(&mut text, &mut origin, lower, index);
            }
        });
    }

    origin.push(count);
    FoldedText { text, origin }
}

/// Fold without keeping the origin map
pub fn fold_str(source: &str, options: FoldOptions) -> String {
    fold(source, options).text
}

/// Byte ranges of every occurrence of `needle` in `haystack`, overlapping ones included
pub fn find_all(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let mut matches = Vec::new();
    if needle.is_empty() {
        return matches;
    }

    let mut from = 0;
    while from <= haystack.len() {
        let Some(found) = haystack[from..].find(needle) else {
            break;
        };
        let start = from + found;
        matches.push((start, start + needle.len()));

        let step = haystack[start..].chars().next().map_or(1, char::len_utf8);
        from = start + step;
    }
    matches
}

fn push_char(text: &mut String, origin: &mut Vec<usize>, ch: char, source_index: usize) {
    text.push(ch);
    origin.extend(std::iter::repeat(source_index).take(ch.len_utf8()));
}

fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

fn unify_glyph(ch: char) -> Option<&'static str> {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{0060}' | '\u{00B4}' => {
            Some("'")
        }
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => {
            Some("\"")
        }
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => {
            Some("-")
        }
        '\u{2026}' => Some("..."),
        _ => None,
    }
}
