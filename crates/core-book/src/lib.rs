//! Type-erased registry of concurrently-filled observables.
//!
//! Processors book histograms here during init and receive [`Handle`]s: the
//! only concurrent surface of the store. The memory-sharing policy behind a
//! handle is chosen per entry at booking time:
//!
//! - `Single`: one instance, one lock;
//! - `MultiCopy`: one instance per worker, lock-free during fills, merged on
//!   read through the type's registered merge function;
//! - `MultiShared`: one backing instance filled through per-worker buffers
//!   that flush under the backing lock.
//!
//! Merged values are recomputed on every read so intervening fills are
//! always visible. Selections are non-owning, ordered views produced by
//! applying a [`Condition`] to the store.

use thiserror::Error;

pub mod condition;
pub mod entry;
pub mod flags;
pub mod handle;
pub mod hist;
pub mod layout;
pub mod merge;
pub mod selection;
pub mod store;
pub mod worker;
pub mod writer;

pub use condition::{Condition, ConditionBuilder};
pub use entry::{EntryKey, WeakEntry};
pub use flags::{BookFlag, LayoutKind};
pub use handle::Handle;
pub use hist::{
    AxisConfig, Fillable, Histogram, Precision, H1D, H1F, H1I, H2D, H2F, H2I, H3D, H3F, H3I,
};
pub use layout::FILL_BUFFER_CAP;
pub use merge::{register_merge, Mergeable};
pub use selection::{ComposeStrategy, Selection};
pub use store::BookStore;
pub use worker::{set_worker_index, worker_index};
pub use writer::{StoreWriter, TomlStoreWriter};

/// Errors raised by the book store.
#[derive(Debug, Error)]
pub enum BookError {
    /// Paths are absolute, directory-like, and end in `/`.
    #[error("invalid entry path '{path}' (must start and end with '/')")]
    InvalidPath { path: String },

    #[error("entry '{path}{name}' already booked")]
    DuplicateEntry { path: String, name: String },

    #[error("no entry at '{path}{name}'")]
    ObjectNotFound { path: String, name: String },

    /// Booking a per-worker-copy entry for a type with no registered merge.
    #[error("no merge function registered for type '{type_name}'")]
    UnsupportedMerge { type_name: &'static str },

    /// More than one memory-layout bit set.
    #[error("conflicting memory-layout flags {flags:?}")]
    InvalidFlags { flags: BookFlag },

    /// A typed access did not match the entry's stored type.
    #[error("entry '{path}{name}' holds type '{stored}'")]
    TypeMismatch {
        path: String,
        name: String,
        stored: &'static str,
    },

    #[error("failed to serialize merged object: {0}")]
    Serialize(String),

    #[error("store artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}
