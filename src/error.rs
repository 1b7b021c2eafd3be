//! Error types for the anchoring engine
//!
//! Most anchoring failures are recoverable and never surface as errors: the resolver falls
//! back to the stored position and the search skips broken sections. These types cover the
//! places where a collaborator genuinely fails (section loads, position ids, XHTML input).

use thiserror::Error;

use crate::cfi::CfiParseError;
use crate::dom::DocumentError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AnchorError>;

/// Anchoring engine error type
#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Section {index} failed to load: {reason}")]
    SectionLoad { index: usize, reason: String },

    #[error("Section {0} is not mounted")]
    SectionUnavailable(usize),

    #[error("Invalid position id: {0}")]
    InvalidPosition(#[from] CfiParseError),

    #[error("Position does not resolve: {0}")]
    PositionUnresolved(String),

    #[error("Range cannot be addressed: {0}")]
    UnaddressableRange(String),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}
