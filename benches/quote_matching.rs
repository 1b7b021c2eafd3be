//! Quote Matching Benchmarks
//!
//! Index building and quote matching over chapter-sized documents.
//!
//! Run with: `cargo bench --bench quote_matching`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use amnesia_anchoring::dom::Document;
use amnesia_anchoring::matcher::QuoteMatcher;
use amnesia_anchoring::text_index::build_index;

/// A chapter of `paragraphs` paragraphs with a recurring phrase every tenth paragraph
fn create_chapter(paragraphs: usize) -> Document {
    let texts: Vec<String> = (0..paragraphs)
        .map(|i| {
            if i % 10 == 0 {
                format!(
                    "Paragraph {} returns to the \u{201C}quiet house\u{201D} once more, at dusk.",
                    i
                )
            } else {
                format!(
                    "Paragraph {} is ordinary filler text about the harbor, the boats and the gulls.",
                    i
                )
            }
        })
        .collect();
    Document::from_paragraphs(&texts)
}

fn bench_build_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_index");
    group.measurement_time(Duration::from_secs(5));

    for size in [50, 500] {
        let doc = create_chapter(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| black_box(build_index(black_box(doc))))
        });
    }

    group.finish();
}

fn bench_find_best_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_best_range");
    group.measurement_time(Duration::from_secs(5));

    let matcher = QuoteMatcher::default();
    for size in [50, 500] {
        let index = build_index(&create_chapter(size));
        let prefix = format!("Paragraph {} returns to the", size - 10);

        // Many occurrences, context picks the last one
        group.bench_with_input(BenchmarkId::new("with_context", size), &index, |b, index| {
            b.iter(|| {
                black_box(matcher.find_best_range(
                    index,
                    black_box("\"quiet house\""),
                    Some(prefix.as_str()),
                    Some("once more"),
                ))
            })
        });

        group.bench_with_input(BenchmarkId::new("absent", size), &index, |b, index| {
            b.iter(|| black_box(matcher.find_best_range(index, black_box("lighthouse keeper"), None, None)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_index, bench_find_best_range);
criterion_main!(benches);
