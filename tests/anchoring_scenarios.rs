use std::sync::Arc;
use std::time::Duration;

use amnesia_anchoring::engine::{DecorationKind, DecorationOp};
use amnesia_anchoring::{
    Annotation, AnchorResolver, EngineConfig, MemoryEngine, OperationOutcome, OverlayInputs,
    ReaderSession, RenderingEngine, ResolutionStage,
};

const QUIET_HOUSE: &str = "the quiet house";

fn chapter(title: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>{title}</title></head>\
         <body><h1>{title}</h1>{body}</body></html>"
    )
}

/// Five chapters; the quiet house passage sits in chapter 2
fn five_chapter_book() -> Arc<MemoryEngine> {
    let engine = MemoryEngine::new();
    let chapters = [
        chapter("One", &["The lighthouse keeper woke before dawn."]),
        chapter(
            "Two",
            &[
                "The lighthouse was a smear in the rain.",
                "She walked toward the quiet house at dusk.",
            ],
        ),
        chapter("Three", &["A letter arrived.", "It mentioned the lighthouse twice."]),
        chapter("Four", &["Nobody spoke of the lighthouse &amp; its lamp."]),
        chapter("Five", &["At last the lighthouse went dark."]),
    ];
    for (i, xhtml) in chapters.iter().enumerate() {
        engine
            .add_section(&format!("OEBPS/ch{}.xhtml", i + 1), xhtml)
            .unwrap();
    }
    Arc::new(engine)
}

fn quiet_house_annotation(engine: &MemoryEngine) -> Annotation {
    let pid = engine.position_for_text(1, QUIET_HOUSE).unwrap();
    Annotation::new_highlight(&pid, QUIET_HOUSE)
        .with_context("She walked toward", "at dusk.")
        .in_chapter("OEBPS/ch2.xhtml")
        .with_id("quiet-house")
}

#[tokio::test]
async fn quiet_house_recovered_after_reflow_then_served_from_cache() {
    let engine = five_chapter_book();
    let annotation = quiet_house_annotation(&engine);

    // The passage moves from chapter 2 to chapter 3 and chapter 3 is on screen
    engine
        .replace_section(1, &chapter("Two", &["Rain all afternoon."]))
        .unwrap();
    engine
        .replace_section(
            2,
            &chapter(
                "Three",
                &["A letter arrived.", "She walked toward the quiet house at dusk."],
            ),
        )
        .unwrap();
    engine.render_only(&[2]);

    let mut resolver = AnchorResolver::new(engine.clone(), &EngineConfig::default().matching);

    let first = resolver.resolve(&annotation).await;
    assert_eq!(first.stage, ResolutionStage::RenderedSearch);
    let resolved = engine.resolve_position(&first.position_id).unwrap();
    assert_eq!(resolved.href, "OEBPS/ch3.xhtml");
    assert_eq!(resolved.text, QUIET_HOUSE);

    let scanned = resolver.stats().sections_scanned;
    let second = resolver.resolve(&annotation).await;
    assert_eq!(second.stage, ResolutionStage::Cached);
    assert_eq!(second.position_id, first.position_id);
    assert_eq!(resolver.stats().sections_scanned, scanned);
    assert_eq!(engine.load_count(), 0);
}

#[tokio::test]
async fn lighthouse_search_skips_failing_section() {
    let engine = five_chapter_book();
    engine.fail_loads(2);
    let session = ReaderSession::new(engine.clone(), EngineConfig::default());

    let results = match session.search("lighthouse").await {
        OperationOutcome::Committed(results) => results,
        OperationOutcome::Superseded => panic!("search was not superseded"),
    };

    let sections: Vec<usize> = results.iter().map(|r| r.spine_index).collect();
    assert_eq!(sections, vec![0, 1, 3, 4]);
    assert!(results[2].excerpt.contains("lighthouse & its lamp"));
    assert_eq!(engine.load_count(), 5);
    assert_eq!(engine.unload_count(), 5);
    assert!(engine.loaded_sections().is_empty());
}

#[tokio::test(start_paused = true)]
async fn superseded_search_commits_nothing_and_releases_sections() {
    let memory = MemoryEngine::new().with_load_delay(Duration::from_millis(25));
    for i in 0..5 {
        memory
            .add_section(&format!("ch{i}.xhtml"), &chapter("C", &["the lighthouse at night"]))
            .unwrap();
    }
    let engine = Arc::new(memory);
    let session = Arc::new(ReaderSession::new(engine.clone(), EngineConfig::default()));

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.search("lighthouse").await })
    };
    tokio::time::sleep(Duration::from_millis(60)).await;
    let second = session.search("night").await;

    assert_eq!(first.await.unwrap(), OperationOutcome::Superseded);
    assert_eq!(second.committed().map(|r| r.len()), Some(5));

    // Loads at 0, 25 and 50 ms; the one finishing at 75 ms finds the newer search and stops
    let first_loads = engine.load_count() - 5;
    assert_eq!(first_loads, 3);
    assert!(first_loads < engine.spine().len());
    assert_eq!(engine.load_count(), engine.unload_count());
}

#[tokio::test]
async fn failing_position_step_still_unloads_once() {
    let engine = five_chapter_book();
    let annotation = quiet_house_annotation(&engine);
    engine.render_only(&[0]);
    engine.fail_positions(1);

    let mut resolver = AnchorResolver::new(engine.clone(), &EngineConfig::default().matching);
    let resolved = resolver.resolve(&annotation).await;

    assert_eq!(resolved.stage, ResolutionStage::Fallback);
    assert_eq!(resolved.position_id, annotation.position_id);
    assert_eq!(engine.load_count(), 1);
    assert_eq!(engine.unload_count(), 1);
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let engine = five_chapter_book();
    engine.render_only(&[0, 1]);
    let keeper = Annotation::new_highlight(
        &engine.position_for_text(0, "lighthouse keeper").unwrap(),
        "lighthouse keeper",
    )
    .with_id("keeper");
    let inputs = OverlayInputs {
        annotations: vec![keeper, quiet_house_annotation(&engine)],
        ..OverlayInputs::default()
    };
    let session = ReaderSession::new(engine.clone(), EngineConfig::default());

    let first = session.reconcile_now(&inputs).await;
    assert_eq!(first.added, 2);
    let drawn = engine.decorations();
    engine.take_decoration_ops();

    let second = session.reconcile_now(&inputs).await;
    assert!(second.is_noop());
    assert_eq!(engine.decorations(), drawn);
    assert!(engine.decoration_ops().is_empty());
}

#[tokio::test]
async fn switching_search_results_touches_only_search_decorations() {
    let engine = five_chapter_book();
    engine.render_only(&[0, 1]);
    let session = ReaderSession::new(engine.clone(), EngineConfig::default());
    let annotation = quiet_house_annotation(&engine);

    let lighthouse = session.search("lighthouse").await.committed().unwrap();
    session
        .reconcile_now(&OverlayInputs {
            annotations: vec![annotation.clone()],
            search_results: lighthouse,
            ..OverlayInputs::default()
        })
        .await;
    engine.take_decoration_ops();

    let dawn = session.search("dawn").await.committed().unwrap();
    let report = session
        .reconcile_now(&OverlayInputs {
            annotations: vec![annotation],
            search_results: dawn,
            ..OverlayInputs::default()
        })
        .await;

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.added, 1);
    assert!(engine.take_decoration_ops().iter().all(|op| match op {
        DecorationOp::Add(d) => d.style_class == "ll-search-match",
        DecorationOp::Remove { kind, .. } => *kind == DecorationKind::SearchMatch,
    }));
}

#[tokio::test]
async fn tie_break_is_stable_across_runs() {
    let engine = MemoryEngine::new();
    engine
        .add_section(
            "ch1.xhtml",
            &chapter("Echo", &["echo in the hall", "echo in the hall", "echo in the hall"]),
        )
        .unwrap();
    engine.render(0);
    let engine = Arc::new(engine);

    let lost = Annotation::new_highlight("epubcfi(/6/2!/4/40/1,:0,:4)", "echo in the hall").with_id("echo");
    let mut positions = Vec::new();
    for _ in 0..3 {
        let mut resolver = AnchorResolver::new(engine.clone(), &EngineConfig::default().matching);
        positions.push(resolver.resolve(&lost).await.position_id);
    }
    assert!(positions.windows(2).all(|w| w[0] == w[1]));
    // First paragraph after the heading
    assert!(positions[0].starts_with("epubcfi(/6/2!/4/4/1"));
}
