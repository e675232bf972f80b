//! The book store: keyed registry of concurrently-filled observables.
//!
//! Mutation (booking, removal, clearing) is single-threaded by contract:
//! it happens during init and teardown only, never while events are in
//! flight. Handles obtained at booking time are the concurrent surface.

use std::any::{Any, TypeId};
use std::sync::Arc;

use ahash::AHashMap;
use serde::Serialize;
use tracing::debug;

use crate::condition::Condition;
use crate::entry::{EntryInner, EntryKey, WeakEntry};
use crate::flags::{BookFlag, LayoutKind};
use crate::handle::{Handle, HandleMode};
use crate::hist::Fillable;
use crate::layout::{BufferedLayout, SharedLayout, SingleLayout};
use crate::merge;
use crate::selection::Selection;
use crate::writer::StoreWriter;
use crate::BookError;

/// Fixed seeds so entry hashes are stable across runs.
static KEY_HASHER: std::sync::LazyLock<ahash::RandomState> =
    std::sync::LazyLock::new(|| ahash::RandomState::with_seeds(0x6576, 0x656e, 0x7469, 0x6465));

fn serialize_merged<T: Fillable + Serialize>(
    any: Box<dyn Any + Send>,
) -> Result<toml::Value, BookError> {
    let value = any
        .downcast::<T>()
        .map_err(|_| BookError::Serialize("merged object type mismatch".into()))?;
    toml::Value::try_from(&*value).map_err(|e| BookError::Serialize(e.to_string()))
}

/// Keyed registry of booked entries.
pub struct BookStore {
    /// Slot per booking; `remove` clears the slot in place so insertion
    /// indices stay stable until `clear`.
    entries: Vec<Option<Arc<EntryInner>>>,
    lookup: AHashMap<String, usize>,
    default_layout: LayoutKind,
    store_by_default: bool,
    worker_count: usize,
}

impl BookStore {
    /// `worker_count` sizes per-worker-copy layouts and fill buffers.
    pub fn new(worker_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            lookup: AHashMap::new(),
            default_layout: LayoutKind::MultiShared,
            store_by_default: true,
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Configure the layout used when booking with default flags.
    pub fn set_default_layout(&mut self, layout: LayoutKind) {
        self.default_layout = layout;
    }

    /// Configure whether default-flag bookings are written at shutdown.
    pub fn set_store_by_default(&mut self, store: bool) {
        self.store_by_default = store;
    }

    fn validate(&self, path: &str, name: &str) -> Result<String, BookError> {
        if !path.starts_with('/') || !path.ends_with('/') || name.is_empty() || name.contains('/') {
            return Err(BookError::InvalidPath {
                path: format!("{path}{name}"),
            });
        }
        let full = format!("{path}{name}");
        if self.lookup.contains_key(&full) {
            return Err(BookError::DuplicateEntry {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
        Ok(full)
    }

    /// Book with explicit flags. An empty layout mask resolves against the
    /// store default; completely default flags also adopt the store's
    /// store-by-default policy.
    pub fn book<T>(
        &mut self,
        path: &str,
        name: &str,
        flags: BookFlag,
        make: impl Fn() -> T + Send + Sync + 'static,
    ) -> Result<Handle<T>, BookError>
    where
        T: Fillable + Serialize,
    {
        let full = self.validate(path, name)?;
        let layout_kind = flags.layout()?.unwrap_or(self.default_layout);
        let store = if flags == BookFlag::DEFAULT {
            self.store_by_default
        } else {
            flags.contains(BookFlag::STORE)
        };

        let (mode, amt) = match layout_kind {
            LayoutKind::Single => {
                let layout = Arc::new(SingleLayout::new(make()));
                (HandleMode::Single(layout), 1)
            }
            LayoutKind::MultiCopy => {
                let merge_fn = merge::lookup(TypeId::of::<T>(), std::any::type_name::<T>())?;
                let layout = Arc::new(SharedLayout::new(self.worker_count, make, merge_fn));
                (HandleMode::Copy(layout), self.worker_count)
            }
            LayoutKind::MultiShared => {
                let layout = Arc::new(BufferedLayout::new(make(), self.worker_count));
                (HandleMode::Shared(layout), 1)
            }
        };

        let mut key = EntryKey::new(TypeId::of::<T>(), std::any::type_name::<T>());
        key.path = path.to_string();
        key.name = name.to_string();
        key.amt = amt;
        key.flags = layout_kind.flag() | if store { BookFlag::STORE } else { BookFlag::DEFAULT };
        key.idx = self.entries.len();
        key.hash = KEY_HASHER.hash_one(&full);

        debug!(
            target: "book.store",
            path,
            name,
            layout = ?layout_kind,
            store,
            amt,
            "entry_booked"
        );

        let erased: Arc<dyn crate::layout::MemLayout> = match &mode {
            HandleMode::Single(layout) => layout.clone(),
            HandleMode::Copy(layout) => layout.clone(),
            HandleMode::Shared(layout) => layout.clone(),
        };
        let inner = Arc::new(EntryInner::new(
            key,
            erased,
            serialize_merged::<T>,
            Box::new(mode.clone()),
        ));
        self.lookup.insert(full, self.entries.len());
        self.entries.push(Some(inner.clone()));
        Ok(Handle::new(inner, mode))
    }

    pub fn book_single<T: Fillable + Serialize>(
        &mut self,
        path: &str,
        name: &str,
        make: impl Fn() -> T + Send + Sync + 'static,
    ) -> Result<Handle<T>, BookError> {
        self.book(path, name, BookFlag::SINGLE, make)
    }

    pub fn book_multi_copy<T: Fillable + Serialize>(
        &mut self,
        path: &str,
        name: &str,
        make: impl Fn() -> T + Send + Sync + 'static,
    ) -> Result<Handle<T>, BookError> {
        self.book(path, name, BookFlag::MULTI_COPY, make)
    }

    pub fn book_multi_shared<T: Fillable + Serialize>(
        &mut self,
        path: &str,
        name: &str,
        make: impl Fn() -> T + Send + Sync + 'static,
    ) -> Result<Handle<T>, BookError> {
        self.book(path, name, BookFlag::MULTI_SHARED, make)
    }

    /// Re-derive a typed handle for an existing entry, as when a per-worker
    /// processor clone attaches to an observable its sibling already booked.
    pub fn handle<T: Fillable>(&self, path: &str, name: &str) -> Result<Handle<T>, BookError> {
        let not_found = || BookError::ObjectNotFound {
            path: path.to_string(),
            name: name.to_string(),
        };
        let idx = *self
            .lookup
            .get(&format!("{path}{name}"))
            .ok_or_else(not_found)?;
        let inner = self
            .entries
            .get(idx)
            .and_then(Option::as_ref)
            .ok_or_else(not_found)?;
        let mode = inner
            .mode_any()
            .downcast_ref::<HandleMode<T>>()
            .ok_or_else(|| BookError::TypeMismatch {
                path: path.to_string(),
                name: name.to_string(),
                stored: inner.key().type_name,
            })?
            .clone();
        Ok(Handle::new(inner.clone(), mode))
    }

    /// Key of the entry at `(path, name)`.
    pub fn get_key(&self, path: &str, name: &str) -> Result<&EntryKey, BookError> {
        let not_found = || BookError::ObjectNotFound {
            path: path.to_string(),
            name: name.to_string(),
        };
        let idx = *self
            .lookup
            .get(&format!("{path}{name}"))
            .ok_or_else(not_found)?;
        self.entries
            .get(idx)
            .and_then(Option::as_ref)
            .map(|entry| entry.key())
            .ok_or_else(not_found)
    }

    /// All live entries matching the condition, in insertion order.
    pub fn find(&self, condition: Condition) -> Selection {
        Selection::from_entries(self.entries.iter().flatten(), condition)
    }

    /// The first live entry matching the condition.
    pub fn find_first(&self, condition: &Condition) -> Option<WeakEntry> {
        self.entries
            .iter()
            .flatten()
            .find(|entry| condition.matches(entry.key()))
            .map(WeakEntry::new)
    }

    /// Clear the entry in place. Index positions of other entries are
    /// unaffected; outstanding handles observe the removal on next fill.
    pub fn remove(&mut self, key: &EntryKey) -> Result<(), BookError> {
        let full = key.full_name();
        let idx = self.lookup.remove(&full).ok_or_else(|| BookError::ObjectNotFound {
            path: key.path.clone(),
            name: key.name.clone(),
        })?;
        if let Some(entry) = self.entries[idx].take() {
            entry.kill();
        }
        debug!(target: "book.store", entry = full.as_str(), "entry_removed");
        Ok(())
    }

    /// Invalidate every entry and handle.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..).flatten() {
            entry.kill();
        }
        self.lookup.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every entry booked with the `STORE` flag.
    pub fn store(&self, writer: &mut dyn StoreWriter) -> Result<(), BookError> {
        let selection = self.find(Condition::new(|key| key.flags.contains(BookFlag::STORE)));
        writer.write_selection(&selection)
    }

    /// Write an explicit subset.
    pub fn store_selection(
        &self,
        writer: &mut dyn StoreWriter,
        selection: &Selection,
    ) -> Result<(), BookError> {
        writer.write_selection(selection)
    }
}

impl std::fmt::Debug for BookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookStore")
            .field("entries", &self.len())
            .field("workers", &self.worker_count)
            .finish()
    }
}
