//! Booked entries and their identity.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::flags::BookFlag;
use crate::layout::MemLayout;
use crate::BookError;

/// Identity of a booked observable.
#[derive(Debug, Clone)]
pub struct EntryKey {
    /// Absolute directory-like location, always ending in `/`.
    pub path: String,
    /// Leaf name; `(path, name)` is unique within a store.
    pub name: String,
    /// Runtime type of the stored object.
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// Number of backing instances.
    pub amt: usize,
    pub flags: BookFlag,
    /// Insertion index within the store, stable until `clear`.
    pub idx: usize,
    /// Derived identifier for external comparison.
    pub hash: u64,
}

impl EntryKey {
    pub fn new(type_id: TypeId, type_name: &'static str) -> Self {
        Self {
            path: String::new(),
            name: String::new(),
            type_id,
            type_name,
            amt: 0,
            flags: BookFlag::DEFAULT,
            idx: 0,
            hash: 0,
        }
    }

    /// The full identifier, `path` + `name`.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.path, self.name)
    }
}

type SerializeMerged = fn(Box<dyn std::any::Any + Send>) -> Result<toml::Value, BookError>;

/// A live entry: key, layout, and liveness. Handles share this through an
/// `Arc`, so removing an entry from the store releases the store's reference
/// while outstanding handles keep the memory alive (and observe the kill
/// flag on their next fill).
pub struct EntryInner {
    key: EntryKey,
    layout: Arc<dyn MemLayout>,
    serialize: SerializeMerged,
    /// Type-erased fill mode, downcast when re-deriving typed handles.
    mode: Box<dyn std::any::Any + Send + Sync>,
    alive: AtomicBool,
}

impl EntryInner {
    pub(crate) fn new(
        key: EntryKey,
        layout: Arc<dyn MemLayout>,
        serialize: SerializeMerged,
        mode: Box<dyn std::any::Any + Send + Sync>,
    ) -> Self {
        Self {
            key,
            layout,
            serialize,
            mode,
            alive: AtomicBool::new(true),
        }
    }

    pub(crate) fn mode_any(&self) -> &(dyn std::any::Any + Send + Sync) {
        self.mode.as_ref()
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn layout(&self) -> &Arc<dyn MemLayout> {
        &self.layout
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn kill(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// The merged object serialized for the store artifact.
    pub fn merged_toml(&self) -> Result<toml::Value, BookError> {
        (self.serialize)(self.layout.merged_any())
    }
}

impl std::fmt::Debug for EntryInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryInner")
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Non-owning view of an entry, as held by selections.
#[derive(Debug, Clone)]
pub struct WeakEntry {
    inner: Weak<EntryInner>,
}

impl WeakEntry {
    pub(crate) fn new(inner: &Arc<EntryInner>) -> Self {
        Self {
            inner: Arc::downgrade(inner),
        }
    }

    /// True iff the backing entry was not removed.
    pub fn valid(&self) -> bool {
        self.inner.upgrade().is_some_and(|e| e.is_alive())
    }

    pub fn upgrade(&self) -> Option<Arc<EntryInner>> {
        self.inner.upgrade().filter(|e| e.is_alive())
    }

    pub fn key(&self) -> Option<EntryKey> {
        self.upgrade().map(|e| e.key().clone())
    }
}
