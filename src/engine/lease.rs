//! Scoped section loading
//!
//! Loaded sections are shared renderer state. Whoever loads one for inspection must unload it
//! on every exit path, so loading only happens through [`SectionLease`], which unloads in
//! `Drop`. That covers early returns, `?` propagation, panics and a future being dropped
//! mid-await.

use std::sync::Arc;

use super::{RenderingEngine, SectionHandle};
use crate::error::Result;

/// Unloads exactly once when dropped
struct UnloadOnDrop {
    engine: Arc<dyn RenderingEngine>,
    index: usize,
}

impl Drop for UnloadOnDrop {
    fn drop(&mut self) {
        tracing::trace!(section = self.index, "Unloading section");
        self.engine.unload_section(self.index);
    }
}

/// A section loaded for the lifetime of this value
pub struct SectionLease {
    handle: Arc<dyn SectionHandle>,
    _unload: UnloadOnDrop,
}

impl SectionLease {
    /// Load section `index`. The unload is armed before the load is awaited, so a failed or
    /// abandoned load is still released.
    pub async fn acquire(engine: &Arc<dyn RenderingEngine>, index: usize) -> Result<Self> {
        let unload = UnloadOnDrop {
            engine: Arc::clone(engine),
            index,
        };
        tracing::trace!(section = index, "Loading section");
        let handle = engine.load_section(index).await?;
        Ok(Self {
            handle,
            _unload: unload,
        })
    }

    pub fn handle(&self) -> &Arc<dyn SectionHandle> {
        &self.handle
    }

    pub fn index(&self) -> usize {
        self.handle.index()
    }
}
