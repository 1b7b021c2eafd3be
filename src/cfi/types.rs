//! CFI value types
//!
//! Format: `epubcfi(/6/4[chap01ref]!/4/2/3:12)` for a point, and
//! `epubcfi(/6/4!/4/2,/1:3,/3:9)` for a range (common parent, start, end).
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed position id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cfi {
    /// Full path for points, common parent path for ranges
    pub path: CfiPath,
    pub range: Option<CfiRange>,
}

/// Steps plus an optional character offset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfiPath {
    pub steps: Vec<CfiStep>,
    pub offset: Option<u32>,
}

/// Start and end paths, relative to the common parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfiRange {
    pub start: CfiPath,
    pub end: CfiPath,
}

/// One `/n[id]` or `!` step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfiStep {
    pub kind: StepKind,
    pub id_assertion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Even numbers address elements, odd numbers the text between them
    Child(u32),
    /// `!` - step into the referenced content document
    Indirection,
}

impl Cfi {
    pub fn point(path: CfiPath) -> Self {
        Self { path, range: None }
    }

    pub fn with_range(path: CfiPath, range: CfiRange) -> Self {
        Self {
            path,
            range: Some(range),
        }
    }

    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    /// 0-based spine index from the leading `/6/N` steps
    pub fn spine_index(&self) -> Option<usize> {
        match self.path.steps.as_slice() {
            [first, second, ..] if first.kind == StepKind::Child(6) => match second.kind {
                StepKind::Child(n) if n >= 2 && n % 2 == 0 => Some((n / 2 - 1) as usize),
                _ => None,
            },
            _ => None,
        }
    }

    /// Steps after the indirection, i.e. inside the content document
    pub fn content_steps(&self) -> &[CfiStep] {
        self.path.content_steps()
    }

    /// Full start path (common parent + start), or the point itself
    pub fn start(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.join(&range.start),
            None => self.path.clone(),
        }
    }

    /// Full end path (common parent + end), or the point itself
    pub fn end(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.join(&range.end),
            None => self.path.clone(),
        }
    }
}

impl CfiPath {
    pub fn new(steps: Vec<CfiStep>, offset: Option<u32>) -> Self {
        Self { steps, offset }
    }

    pub fn push(&mut self, step: CfiStep) {
        self.steps.push(step);
    }

    /// Append a relative path; the relative offset wins
    pub fn join(&self, relative: &CfiPath) -> CfiPath {
        let mut steps = self.steps.clone();
        steps.extend(relative.steps.iter().cloned());
        CfiPath {
            steps,
            offset: relative.offset.or(self.offset),
        }
    }

    /// Steps after the indirection
    pub fn content_steps(&self) -> &[CfiStep] {
        match self.steps.iter().position(CfiStep::is_indirection) {
            Some(at) => &self.steps[at + 1..],
            None => &self.steps,
        }
    }
}

impl CfiStep {
    pub fn child(index: u32) -> Self {
        Self {
            kind: StepKind::Child(index),
            id_assertion: None,
        }
    }

    pub fn child_with_id(index: u32, id: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Child(index),
            id_assertion: Some(id.into()),
        }
    }

    pub fn indirection() -> Self {
        Self {
            kind: StepKind::Indirection,
            id_assertion: None,
        }
    }

    pub fn is_indirection(&self) -> bool {
        self.kind == StepKind::Indirection
    }

    pub fn index(&self) -> Option<u32> {
        match self.kind {
            StepKind::Child(n) => Some(n),
            StepKind::Indirection => None,
        }
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}", self.path)?;
        if let Some(range) = &self.range {
            write!(f, ",{},{}", range.start, range.end)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        if let Some(offset) = self.offset {
            write!(f, ":{}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for CfiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StepKind::Child(n) => write!(f, "/{}", n)?,
            StepKind::Indirection => write!(f, "!")?,
        }
        if let Some(id) = &self.id_assertion {
            write!(f, "[{}]", escape_assertion(id))?;
        }
        Ok(())
    }
}

/// Escape the characters CFI reserves inside assertions
fn escape_assertion(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '^' | '[' | ']' | '(' | ')' | ',' | ';' | '=') {
            escaped.push('^');
        }
        escaped.push(ch);
    }
    escaped
}
