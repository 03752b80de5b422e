//! Screen model
//!
//! Provides:
//! - `Cell` with 5250 display and field attributes
//! - `ScreenBuffer`, the fixed-size grid written by the receive loop, with
//!   the host's input fields
//! - `SharedScreen`, the lock-protected handle shared with callers
//! - `ScreenSnapshot`, a detached copy for queries and renderers

mod buffer;
mod cell;
mod snapshot;

pub use buffer::{Dimensions, InputField, Region, ScreenBuffer};
pub use cell::{Cell, CellAttributes, ATTRIBUTE_MAX, ATTRIBUTE_MIN};
pub use snapshot::ScreenSnapshot;

use parking_lot::RwLock;
use std::sync::Arc;

/// Screen shared between the receive loop (writer) and callers (readers)
#[derive(Debug, Clone)]
pub struct SharedScreen {
    inner: Arc<RwLock<ScreenBuffer>>,
}

impl SharedScreen {
    /// Blank screen of the given size
    pub fn new(dims: Dimensions) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ScreenBuffer::new(dims))),
        }
    }

    /// Run a batch of mutations under one write lock, so readers see all or none of it
    pub fn update<R>(&self, f: impl FnOnce(&mut ScreenBuffer) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Screen size
    pub fn dimensions(&self) -> Dimensions {
        self.inner.read().dimensions()
    }

    /// Consistent text rendering
    pub fn as_text(&self) -> String {
        self.inner.read().as_text()
    }

    /// Consistent copy of the grid
    pub fn snapshot(&self) -> ScreenSnapshot {
        self.inner.read().snapshot()
    }

    /// Input fields of the current format
    pub fn fields(&self) -> Vec<InputField> {
        self.inner.read().fields().to_vec()
    }
}
