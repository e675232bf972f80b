//! User-facing fill capability for a booked entry.
//!
//! A handle is the only object a processor keeps after booking. It is cheap
//! to clone, safe to use from any worker thread, and keeps the entry's
//! memory alive even across `remove`. Filling a removed entry is a
//! programming error and fails fast.

use std::sync::Arc;

use crate::entry::{EntryInner, EntryKey};
use crate::hist::Fillable;
use crate::layout::{BufferedLayout, SharedLayout, SingleLayout};

pub(crate) enum HandleMode<T: Fillable> {
    /// Direct fill into the single instance.
    Single(Arc<SingleLayout<T>>),
    /// Fill the calling worker's own instance.
    Copy(Arc<SharedLayout<T>>),
    /// Buffered fill into the shared backing instance.
    Shared(Arc<BufferedLayout<T>>),
}

impl<T: Fillable> Clone for HandleMode<T> {
    fn clone(&self) -> Self {
        match self {
            HandleMode::Single(layout) => HandleMode::Single(layout.clone()),
            HandleMode::Copy(layout) => HandleMode::Copy(layout.clone()),
            HandleMode::Shared(layout) => HandleMode::Shared(layout.clone()),
        }
    }
}

/// Typed fill/read capability bound to one entry.
pub struct Handle<T: Fillable> {
    entry: Arc<EntryInner>,
    mode: HandleMode<T>,
}

impl<T: Fillable> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            mode: self.mode.clone(),
        }
    }
}

impl<T: Fillable> Handle<T> {
    pub(crate) fn new(entry: Arc<EntryInner>, mode: HandleMode<T>) -> Self {
        Self { entry, mode }
    }

    pub fn key(&self) -> &EntryKey {
        self.entry.key()
    }

    /// Record one fill. Panics if the entry was removed from its store.
    pub fn fill(&self, coord: T::Coord, weight: T::Weight) {
        assert!(
            self.entry.is_alive(),
            "fill on removed entry {}",
            self.entry.key().full_name()
        );
        match &self.mode {
            HandleMode::Single(layout) => layout.with_instance(|obj| obj.fill_one(coord, weight)),
            HandleMode::Copy(layout) => layout.fill_slot(coord, weight),
            HandleMode::Shared(layout) => layout.fill_buffered(coord, weight),
        }
    }

    /// Push any buffered fills into the backing instance. A no-op for
    /// unbuffered layouts.
    pub fn flush(&self) {
        if let HandleMode::Shared(layout) = &self.mode {
            layout.flush();
        }
    }

    /// The merged observable, recomputed on every call.
    pub fn merged(&self) -> T {
        match &self.mode {
            HandleMode::Single(layout) => layout.merged(),
            HandleMode::Copy(layout) => layout.merged(),
            HandleMode::Shared(layout) => layout.merged(),
        }
    }

    /// True until the entry is removed or its store cleared.
    pub fn valid(&self) -> bool {
        self.entry.is_alive()
    }
}

impl<T: Fillable> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("key", &self.entry.key().full_name())
            .field("valid", &self.valid())
            .finish()
    }
}
