//! CFI generation
//!
//! Builds position ids from spine indices and document node paths.

use super::types::{Cfi, CfiPath, CfiRange, CfiStep};

/// Builder for constructing CFIs programmatically
#[derive(Debug, Clone, Default)]
pub struct CfiBuilder {
    path: CfiPath,
}

impl CfiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The package spine step (`/6`)
    pub fn package_step(mut self) -> Self {
        self.path.push(CfiStep::child(6));
        self
    }

    /// Spine item step; 0-based index to even CFI numbering (0 -> /2, 1 -> /4)
    pub fn spine_item(mut self, index: usize) -> Self {
        self.path.push(CfiStep::child(even_index(index)));
        self
    }

    /// Spine item step with an idref assertion
    pub fn spine_item_with_id(mut self, index: usize, id: impl Into<String>) -> Self {
        self.path.push(CfiStep::child_with_id(even_index(index), id));
        self
    }

    pub fn indirection(mut self) -> Self {
        self.path.push(CfiStep::indirection());
        self
    }

    /// Append already-computed content steps
    pub fn steps(mut self, steps: impl IntoIterator<Item = CfiStep>) -> Self {
        self.path.steps.extend(steps);
        self
    }

    pub fn into_path(self) -> CfiPath {
        self.path
    }
}

/// Range CFI; the shared leading steps become the common parent.
///
/// When both ends sit in the same node the whole node path is shared and the start/end parts
/// carry only offsets, e.g. `epubcfi(/6/2!/4/2/1,:3,:9)`.
pub fn generate_range(
    spine_index: usize,
    spine_id: Option<&str>,
    start_steps: Vec<CfiStep>,
    start_offset: u32,
    end_steps: Vec<CfiStep>,
    end_offset: u32,
) -> Cfi {
    let common = start_steps
        .iter()
        .zip(end_steps.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let parent = spine_prefix(spine_index, spine_id)
        .steps(start_steps[..common].iter().cloned())
        .into_path();

    Cfi::with_range(
        parent,
        CfiRange {
            start: CfiPath::new(start_steps[common..].to_vec(), Some(start_offset)),
            end: CfiPath::new(end_steps[common..].to_vec(), Some(end_offset)),
        },
    )
}

fn spine_prefix(spine_index: usize, spine_id: Option<&str>) -> CfiBuilder {
    let builder = CfiBuilder::new().package_step();
    let builder = match spine_id {
        Some(id) => builder.spine_item_with_id(spine_index, id),
        None => builder.spine_item(spine_index),
    };
    builder.indirection()
}

fn even_index(index: usize) -> u32 {
    ((index + 1) * 2) as u32
}
