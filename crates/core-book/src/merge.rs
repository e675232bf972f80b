//! Runtime merge-function registry.
//!
//! Per-worker-copy layouts reduce their instances through a merge function
//! looked up by type at booking time. The table is pre-seeded with the nine
//! histogram types; user-defined observable types register explicitly via
//! [`register_merge`]. Booking a per-worker-copy entry for a type without a
//! registered merge fails fast with [`BookError::UnsupportedMerge`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::hist::{H1D, H1F, H1I, H2D, H2F, H2I, H3D, H3F, H3I};
use crate::BookError;

/// An observable type that knows how to fold another instance into itself.
pub trait Mergeable: Clone + Send + Sync + 'static {
    fn merge_from(&mut self, other: &Self);
}

macro_rules! hist_mergeable {
    ($($ty:ty),* $(,)?) => {
        $(impl Mergeable for $ty {
            fn merge_from(&mut self, other: &Self) {
                <$ty>::merge_from(self, other);
            }
        })*
    };
}

hist_mergeable!(H1I, H1F, H1D, H2I, H2F, H2D, H3I, H3F, H3D);

/// Type-erased merge: both sides must be the registered type.
pub type ErasedMerge = fn(&mut dyn Any, &dyn Any);

fn erased_merge<T: Mergeable>(dst: &mut dyn Any, src: &dyn Any) {
    let (Some(dst), Some(src)) = (dst.downcast_mut::<T>(), src.downcast_ref::<T>()) else {
        unreachable!("merge function invoked with a foreign type");
    };
    dst.merge_from(src);
}

static REGISTRY: LazyLock<RwLock<HashMap<TypeId, ErasedMerge>>> = LazyLock::new(|| {
    let mut table: HashMap<TypeId, ErasedMerge> = HashMap::new();
    macro_rules! seed {
        ($($ty:ty),* $(,)?) => {
            $(table.insert(TypeId::of::<$ty>(), erased_merge::<$ty>);)*
        };
    }
    seed!(H1I, H1F, H1D, H2I, H2F, H2D, H3I, H3F, H3D);
    RwLock::new(table)
});

/// Register the merge function for a user-defined observable type.
/// Idempotent.
pub fn register_merge<T: Mergeable>() {
    REGISTRY
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .insert(TypeId::of::<T>(), erased_merge::<T>);
}

/// Look up the merge function for a type, failing fast when unregistered.
pub fn lookup(type_id: TypeId, type_name: &'static str) -> Result<ErasedMerge, BookError> {
    REGISTRY
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&type_id)
        .copied()
        .ok_or(BookError::UnsupportedMerge { type_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hist::AxisConfig;

    #[test]
    fn builtin_types_are_registered() {
        for (id, name) in [
            (TypeId::of::<H1I>(), "H1I"),
            (TypeId::of::<H2F>(), "H2F"),
            (TypeId::of::<H3D>(), "H3D"),
        ] {
            assert!(lookup(id, name).is_ok(), "{name} missing from registry");
        }
    }

    #[test]
    fn unregistered_type_fails_fast() {
        #[derive(Clone)]
        struct Foreign;
        let err = lookup(TypeId::of::<Foreign>(), "Foreign").unwrap_err();
        assert!(matches!(err, BookError::UnsupportedMerge { type_name: "Foreign" }));
        let _ = Foreign;
    }

    #[test]
    fn user_registration_round_trips() {
        #[derive(Clone, Default)]
        struct Counter(u64);
        impl Mergeable for Counter {
            fn merge_from(&mut self, other: &Self) {
                self.0 += other.0;
            }
        }
        register_merge::<Counter>();
        let merge = lookup(TypeId::of::<Counter>(), "Counter").unwrap();
        let mut dst = Counter(2);
        let src = Counter(3);
        merge(&mut dst, &src);
        assert_eq!(dst.0, 5);
    }

    #[test]
    fn erased_merge_applies_histogram_addition() {
        let merge = lookup(TypeId::of::<H1I>(), "H1I").unwrap();
        let axis = [AxisConfig::new("x", 4, 0.0, 4.0)];
        let mut dst = H1I::new("h", axis.clone());
        let mut src = H1I::new("h", axis);
        dst.fill([1.5], 1);
        src.fill([1.5], 2);
        merge(&mut dst, &src);
        assert_eq!(dst.bin_content([1]), 3);
    }
}
