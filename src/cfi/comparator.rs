//! CFI ordering
//!
//! Reading-order comparison of position ids, used to sort annotations and to decide whether a
//! fresh selection falls on an existing annotation.

use std::cmp::Ordering;

use super::types::{Cfi, CfiPath, CfiStep, StepKind};

/// Compare two full paths in reading order
pub fn compare_paths(a: &CfiPath, b: &CfiPath) -> Ordering {
    for (step_a, step_b) in a.steps.iter().zip(b.steps.iter()) {
        let cmp = compare_step(step_a, step_b);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    match a.steps.len().cmp(&b.steps.len()) {
        Ordering::Equal => a.offset.unwrap_or(0).cmp(&b.offset.unwrap_or(0)),
        // Shorter path is an ancestor and starts first
        other => other,
    }
}

fn compare_step(a: &CfiStep, b: &CfiStep) -> Ordering {
    match (a.kind, b.kind) {
        (StepKind::Indirection, StepKind::Indirection) => Ordering::Equal,
        (StepKind::Child(x), StepKind::Child(y)) => x.cmp(&y),
        (StepKind::Indirection, StepKind::Child(_)) => Ordering::Less,
        (StepKind::Child(_), StepKind::Indirection) => Ordering::Greater,
    }
}

/// Compare by start position
pub fn compare(a: &Cfi, b: &Cfi) -> Ordering {
    compare_paths(&a.start(), &b.start())
}

/// True when two ranges share any text. Collapsed positions overlap a range they touch.
pub fn ranges_overlap(a: &Cfi, b: &Cfi) -> bool {
    let (a_start, a_end) = (a.start(), a.end());
    let (b_start, b_end) = (b.start(), b.end());

    if !a.is_range() || !b.is_range() {
        return compare_paths(&a_start, &b_end) != Ordering::Greater
            && compare_paths(&b_start, &a_end) != Ordering::Greater;
    }
    compare_paths(&a_start, &b_end) == Ordering::Less && compare_paths(&b_start, &a_end) == Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfi::parse;

    fn cfi(s: &str) -> Cfi {
        parse(s).unwrap()
    }

    #[test]
    fn test_ordering_same_chapter() {
        assert_eq!(
            compare(&cfi("epubcfi(/6/4!/4/2/1:10)"), &cfi("epubcfi(/6/4!/4/2/1:20)")),
            Ordering::Less
        );
        assert_eq!(compare(&cfi("epubcfi(/6/6!/4/2)"), &cfi("epubcfi(/6/4!/4/2)")), Ordering::Greater);
    }

    #[test]
    fn test_ancestor_sorts_first() {
        assert_eq!(compare(&cfi("epubcfi(/6/4!/4/2)"), &cfi("epubcfi(/6/4!/4/2/1)")), Ordering::Less);
    }

    #[test]
    fn test_sort_mixed_points_and_ranges() {
        let mut cfis = vec![
            cfi("epubcfi(/6/8!/4/2/1:50)"),
            cfi("epubcfi(/6/4!/4/2/1,:10,:30)"),
            cfi("epubcfi(/6/4!/4/2/1:5)"),
        ];
        cfis.sort_by(compare);
        assert_eq!(cfis[0].to_string(), "epubcfi(/6/4!/4/2/1:5)");
        assert_eq!(cfis[1].to_string(), "epubcfi(/6/4!/4/2/1,:10,:30)");
        assert_eq!(cfis[2].to_string(), "epubcfi(/6/8!/4/2/1:50)");
    }

    #[test]
    fn test_ranges_overlap() {
        let a = cfi("epubcfi(/6/4!/4/2/1,:0,:10)");
        let b = cfi("epubcfi(/6/4!/4/2/1,:5,:20)");
        let c = cfi("epubcfi(/6/4!/4/2/1,:10,:20)");
        assert!(ranges_overlap(&a, &b));
        assert!(!ranges_overlap(&a, &c));
        assert!(ranges_overlap(&cfi("epubcfi(/6/4!/4/2/1:10)"), &c));
    }
}
