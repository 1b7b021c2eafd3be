//! Amnesia Anchoring
//!
//! Annotation anchoring and overlay reconciliation for the EPUB reader.
//!
//! Annotations are stored as a quote with a little context plus the position id they were
//! captured at. When the book reflows, that position id may stop pointing at the quote;
//! this crate finds the quote again and keeps the drawn decorations in step with the
//! annotations the application wants shown.
//!
//! # Modules
//!
//! - `text_index`, `matcher`, `normalize`: flat text of a section and quote matching in it
//! - `anchor`: staged resolution of an annotation to a verified position id
//! - `overlay`: desired vs applied decorations, debounced reconcile passes
//! - `search`: cancellable full-text search across the spine
//! - `lookup`: latest-wins dictionary and translation lookups
//! - `session`: the façade an application drives
//! - `engine`: the rendering engine interface and an in-memory implementation
//! - `cfi`, `dom`: position ids and the document model behind them

pub mod anchor;
pub mod annotations;
pub mod callbacks;
pub mod cfi;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod matcher;
pub mod normalize;
pub mod overlay;
pub mod search;
pub mod session;
pub mod text_index;
pub mod token;

pub use anchor::{AnchorResolver, ResolutionStage, ResolvedPosition};
pub use annotations::{Annotation, AnnotationKind};
pub use callbacks::{ReaderCallbacks, SelectionEvent};
pub use config::EngineConfig;
pub use engine::{MemoryEngine, RenderingEngine, SectionHandle, SectionLease};
pub use error::{AnchorError, Result};
pub use matcher::{find_best_range, QuoteMatcher};
pub use overlay::{AnnotationReconciler, OverlayInputs, ReconcileReport, ReconcileScheduler};
pub use search::{SearchCoordinator, SearchResult};
pub use session::ReaderSession;
pub use text_index::{build_index, TextIndex};
pub use token::{Channel, OperationOutcome, OperationTokens, TokenChannel};
