//! Amnesia anchoring demo
//!
//! Loads a fixture of XHTML sections and annotations into the in-memory engine, reconciles
//! the overlay, optionally runs a search, and prints the outcome as JSON.
//!
//! ```text
//! amnesia-anchor demos/reflowed_book.json
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amnesia_anchoring::anchor::ResolvedPosition;
use amnesia_anchoring::engine::Decoration;
use amnesia_anchoring::{
    Annotation, EngineConfig, MemoryEngine, OperationOutcome, OverlayInputs, ReaderSession,
    ReconcileReport, RenderingEngine, SearchResult,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fixture {
    sections: Vec<FixtureSection>,
    #[serde(default)]
    annotations: Vec<Annotation>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureSection {
    href: String,
    xhtml: String,
    #[serde(default)]
    idref: Option<String>,
    #[serde(default = "default_true")]
    linear: bool,
    #[serde(default)]
    rendered: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnchorOutput {
    id: String,
    #[serde(flatten)]
    resolved: ResolvedPosition,
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    anchors: Vec<AnchorOutput>,
    reconcile: ReconcileReport,
    decorations: Vec<Decoration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<Vec<SearchResult>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first so RUST_LOG from it reaches the filter
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amnesia_anchoring=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = EngineConfig::from_env();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: amnesia-anchor <fixture.json>");
    };
    let raw = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
    let fixture: Fixture = serde_json::from_str(&raw).with_context(|| format!("Invalid fixture {}", path))?;

    let engine = Arc::new(MemoryEngine::new());
    for section in &fixture.sections {
        let index = engine
            .add_section(&section.href, &section.xhtml)
            .with_context(|| format!("Failed to parse {}", section.href))?;
        engine.set_linear(index, section.linear);
        if let Some(idref) = &section.idref {
            engine.set_idref(index, idref);
        }
        if section.rendered {
            engine.render(index);
        }
    }
    tracing::info!(
        sections = fixture.sections.len(),
        annotations = fixture.annotations.len(),
        "Fixture loaded"
    );

    let session = ReaderSession::new(engine.clone(), config);

    let search = match fixture.query.as_deref() {
        Some(query) => match session.search(query).await {
            OperationOutcome::Committed(results) => Some(results),
            OperationOutcome::Superseded => None,
        },
        None => None,
    };

    let inputs = OverlayInputs {
        annotations: fixture.annotations.clone(),
        search_results: search.clone().unwrap_or_default(),
        ..OverlayInputs::default()
    };
    let reconcile = session.reconcile_now(&inputs).await;

    let mut anchors = Vec::with_capacity(fixture.annotations.len());
    {
        let mut reconciler = session.reconciler().lock().await;
        for annotation in &fixture.annotations {
            // Served from the cache the pass above filled
            let resolved = reconciler.resolver_mut().resolve(annotation).await;
            let text = engine.resolve_position(&resolved.position_id).map(|r| r.text);
            anchors.push(AnchorOutput {
                id: annotation.id.clone(),
                resolved,
                text,
            });
        }
    }

    let output = Output {
        anchors,
        reconcile,
        decorations: engine.decorations(),
        search,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    session.shutdown().await;
    Ok(())
}
