//! Annotation module
//!
//! Highlights, notes and bookmarks as pushed in by the application layer. Each record keeps
//! several ways back to its text:
//!
//! - position id (CFI) captured at save time
//! - the exact quote plus a little context on either side
//! - the section href it was captured in
//!
//! Persistence lives outside this crate; these types are read-only inputs here.

mod types;

pub use types::{Annotation, AnnotationKind, DEFAULT_COLOR};
