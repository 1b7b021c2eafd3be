//! CFI (Canonical Fragment Identifier) position ids
//!
//! The reference rendering engine addresses text with EPUB CFIs. The anchoring core treats
//! them as opaque strings; this module is what gives them meaning inside [`MemoryEngine`]
//! and what lets the session order and overlap-test positions.
//!
//! ```text
//! epubcfi(/6/4[chap02]!/4/2,/1:3,/3:9)
//!         │  │        │ │ │  │     └── range end: text node /3, char 9
//!         │  │        │ │ │  └──────── range start: text node /1, char 3
//!         │  │        │ │ └─────────── common parent: 1st element of body
//!         │  │        │ └───────────── body (2nd element of html)
//!         │  │        └─────────────── indirection into the content document
//!         │  └──────────────────────── spine item 1 with idref assertion
//!         └─────────────────────────── package spine
//! ```
//!
//! [`MemoryEngine`]: crate::engine::MemoryEngine

mod comparator;
mod dom;
mod generator;
mod parser;
mod types;

pub use types::{Cfi, CfiPath, CfiRange, CfiStep, StepKind};

pub use parser::{parse, try_parse, CfiParseError};

pub use generator::{generate_range, CfiBuilder};

pub use comparator::{compare, compare_paths, ranges_overlap};

pub use dom::{cfi_to_range, node_steps, range_to_cfi, resolve_steps};
