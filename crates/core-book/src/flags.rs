//! Booking flags.
//!
//! The three memory-layout bits are mutually exclusive (the layout mask);
//! `STORE` is orthogonal and marks an entry for the shutdown write-out. An
//! empty flag set means "resolve against the store's configured defaults".

use bitflags::bitflags;

use crate::BookError;

bitflags! {
    /// Flag set attached to every booked entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BookFlag: u8 {
        /// One backing instance, no synchronization beyond the instance lock.
        const SINGLE = 1 << 0;
        /// One backing instance filled through per-worker buffers.
        const MULTI_SHARED = 1 << 1;
        /// One independent instance per worker, merged on read.
        const MULTI_COPY = 1 << 2;
        /// Write the merged object to the output artifact at shutdown.
        const STORE = 1 << 3;
    }
}

impl BookFlag {
    /// Resolve against the store defaults.
    pub const DEFAULT: BookFlag = BookFlag::empty();

    /// Mask selecting the mutually exclusive memory-layout bits.
    pub const MEMORY_LAYOUT_MASK: BookFlag = BookFlag::SINGLE
        .union(BookFlag::MULTI_SHARED)
        .union(BookFlag::MULTI_COPY);

    /// The requested layout, `None` when left to the store default.
    /// More than one layout bit is an error.
    pub fn layout(self) -> Result<Option<LayoutKind>, BookError> {
        let masked = self & Self::MEMORY_LAYOUT_MASK;
        if masked.is_empty() {
            Ok(None)
        } else if masked == BookFlag::SINGLE {
            Ok(Some(LayoutKind::Single))
        } else if masked == BookFlag::MULTI_SHARED {
            Ok(Some(LayoutKind::MultiShared))
        } else if masked == BookFlag::MULTI_COPY {
            Ok(Some(LayoutKind::MultiCopy))
        } else {
            Err(BookError::InvalidFlags { flags: self })
        }
    }
}

/// The resolved memory-layout policy of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Single,
    MultiShared,
    MultiCopy,
}

impl LayoutKind {
    pub fn flag(self) -> BookFlag {
        match self {
            LayoutKind::Single => BookFlag::SINGLE,
            LayoutKind::MultiShared => BookFlag::MULTI_SHARED,
            LayoutKind::MultiCopy => BookFlag::MULTI_COPY,
        }
    }

    /// Parse the steering spelling used by `DefaultMemoryLayout`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Single" => Some(LayoutKind::Single),
            "MultiShared" => Some(LayoutKind::MultiShared),
            "MultiCopy" => Some(LayoutKind::MultiCopy),
            _ => None,
        }
    }
}
