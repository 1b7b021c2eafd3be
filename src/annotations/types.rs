//! Annotation records as the application layer hands them in
//!
//! Field names serialize in camelCase so records persisted by the reader frontend
//! deserialize without a mapping layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default highlight color
pub const DEFAULT_COLOR: &str = "yellow";

/// A stored annotation. The core only reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Unique identifier (UUID), the overlay key
    pub id: String,
    /// Position id captured at save time. A hint, not a guarantee.
    pub position_id: String,
    /// The exact text that was selected
    pub text: String,
    /// Text immediately before the selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_prefix: Option<String>,
    /// Text immediately after the selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_suffix: Option<String>,
    /// Section the selection was captured in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_href: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: AnnotationKind,
    /// Highlight color name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Note body for note annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Types of annotations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Text highlight
    #[default]
    Highlight,
    /// Highlight carrying a note
    Note,
    /// Position marker
    Bookmark,
}

impl Annotation {
    /// Create a new highlight annotation
    pub fn new_highlight(position_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            position_id: position_id.to_string(),
            text: text.to_string(),
            context_prefix: None,
            context_suffix: None,
            chapter_href: None,
            kind: AnnotationKind::Highlight,
            color: Some(DEFAULT_COLOR.to_string()),
            note: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new note annotation
    pub fn new_note(position_id: &str, text: &str, note: &str) -> Self {
        Self {
            kind: AnnotationKind::Note,
            note: Some(note.to_string()),
            ..Self::new_highlight(position_id, text)
        }
    }

    /// Create a new bookmark annotation
    pub fn new_bookmark(position_id: &str, text: &str) -> Self {
        Self {
            kind: AnnotationKind::Bookmark,
            color: None,
            ..Self::new_highlight(position_id, text)
        }
    }

    /// Set the disambiguation context
    pub fn with_context(mut self, prefix: &str, suffix: &str) -> Self {
        self.context_prefix = Some(prefix.to_string()).filter(|p| !p.is_empty());
        self.context_suffix = Some(suffix.to_string()).filter(|s| !s.is_empty());
        self
    }

    /// Set the capturing section
    pub fn in_chapter(mut self, href: &str) -> Self {
        self.chapter_href = Some(href.to_string());
        self
    }

    /// Set the color
    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// Use a fixed id (records loaded from storage keep theirs)
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }
}
