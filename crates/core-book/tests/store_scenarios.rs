//! Store-level behavior: booking, selections, removal, concurrent fills.

use std::sync::Arc;

use core_book::{
    set_worker_index, AxisConfig, BookError, BookFlag, BookStore, Condition, ConditionBuilder,
    ComposeStrategy, Fillable, LayoutKind, H1D, H1F, H1I,
};
use regex::Regex;
use serde::Serialize;

fn axis(bins: usize, max: f64) -> AxisConfig {
    AxisConfig::new("x", bins, 0.0, max)
}

fn book_three(store: &mut BookStore) {
    store
        .book_single("/a/", "h1", || H1I::new("h1", [axis(10, 10.0)]))
        .unwrap();
    store
        .book_single("/a/", "h2", || H1I::new("h2", [axis(10, 10.0)]))
        .unwrap();
    store
        .book_single("/b/", "h1", || H1I::new("h1", [axis(10, 10.0)]))
        .unwrap();
}

#[test]
fn find_all_after_n_books() {
    let mut store = BookStore::new(2);
    book_three(&mut store);
    let all = store.find(Condition::always());
    assert_eq!(all.size(), 3);
    for (path, name) in [("/a/", "h1"), ("/a/", "h2"), ("/b/", "h1")] {
        let key = store.get_key(path, name).unwrap();
        assert!(key.idx < 3, "insertion index bounded by booking count");
    }
}

#[test]
fn duplicate_and_invalid_paths_rejected() {
    let mut store = BookStore::new(1);
    store
        .book_single("/a/", "h", || H1I::new("h", [axis(2, 2.0)]))
        .unwrap();
    assert!(matches!(
        store.book_single("/a/", "h", || H1I::new("h", [axis(2, 2.0)])),
        Err(BookError::DuplicateEntry { .. })
    ));
    for (path, name) in [("a/", "h"), ("/a", "h"), ("/a/", ""), ("/a/", "x/y")] {
        assert!(
            matches!(
                store.book_single(path, name, || H1I::new("h", [axis(2, 2.0)])),
                Err(BookError::InvalidPath { .. })
            ),
            "expected rejection of ({path}, {name})"
        );
    }
}

#[test]
fn multi_copy_merges_pointwise_across_workers() {
    let mut store = BookStore::new(4);
    let handle = store
        .book_multi_copy("/sum/", "h", || H1I::new("h", [axis(10, 10.0)]))
        .unwrap();

    let threads: Vec<_> = (0..4)
        .map(|worker| {
            let handle = handle.clone();
            std::thread::spawn(move || {
                set_worker_index(worker);
                for i in 0..1000u32 {
                    handle.fill([f64::from(i % 10)], 1);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let merged = handle.merged();
    for k in 0..10 {
        assert_eq!(merged.bin_content([k]), 400, "bin {k}");
    }
    assert_eq!(merged.entries(), 4000);
}

#[test]
fn merged_is_idempotent_between_fills() {
    let mut store = BookStore::new(2);
    let handle = store
        .book_multi_copy("/m/", "h", || H1D::new("h", [axis(4, 4.0)]))
        .unwrap();
    handle.fill([1.0], 2.0);
    assert_eq!(handle.merged(), handle.merged());
}

#[test]
fn selection_composition() {
    let mut store = BookStore::new(1);
    book_three(&mut store);

    let parent = store.find(
        ConditionBuilder::new()
            .set_path("/a/")
            .set_name_regex(Regex::new("^h.*$").unwrap())
            .build(),
    );
    assert_eq!(parent.size(), 2);
    let names: Vec<String> = parent
        .iter()
        .filter_map(|w| w.key())
        .map(|k| k.full_name())
        .collect();
    assert_eq!(names, vec!["/a/h1", "/a/h2"], "insertion order preserved");

    let only_child = parent.find(
        &ConditionBuilder::new().set_name("h1").build(),
        ComposeStrategy::OnlyChild,
    );
    assert_eq!(only_child.size(), 1);
    assert_eq!(only_child.iter().next().unwrap().key().unwrap().name, "h1");
    // The adopted condition no longer carries the path constraint.
    assert!(only_child
        .condition()
        .matches(store.get_key("/b/", "h1").unwrap()));

    let anded = parent.find(
        &ConditionBuilder::new().set_name("h2").build(),
        ComposeStrategy::And,
    );
    assert_eq!(anded.size(), 1);
    assert_eq!(
        anded.iter().next().unwrap().key().unwrap().full_name(),
        "/a/h2"
    );
    // AND keeps the parent's path constraint.
    assert!(!anded.condition().matches(store.get_key("/b/", "h1").unwrap()));

    let only_parent = parent.find(
        &ConditionBuilder::new().set_name("h1").build(),
        ComposeStrategy::OnlyParent,
    );
    assert_eq!(only_parent.size(), 1);
    // Condition is the parent's: still matches what the parent matched.
    assert!(only_parent
        .condition()
        .matches(store.get_key("/a/", "h2").unwrap()));
}

#[test]
fn remove_then_rebook_yields_fresh_entry() {
    let mut store = BookStore::new(1);
    let handle = store
        .book_single("/a/", "h", || H1I::new("h", [axis(4, 4.0)]))
        .unwrap();
    handle.fill([1.0], 5);

    let key = store.get_key("/a/", "h").unwrap().clone();
    store.remove(&key).unwrap();
    assert!(matches!(
        store.get_key("/a/", "h"),
        Err(BookError::ObjectNotFound { .. })
    ));
    assert!(!handle.valid());

    let fresh = store
        .book_single("/a/", "h", || H1I::new("h", [axis(4, 4.0)]))
        .unwrap();
    assert_eq!(fresh.merged().entries(), 0, "rebooked entry starts empty");
    assert_eq!(fresh.key().full_name(), "/a/h");
}

#[test]
#[should_panic(expected = "fill on removed entry")]
fn removed_handle_fails_fast_on_fill() {
    let mut store = BookStore::new(1);
    let handle = store
        .book_single("/a/", "h", || H1I::new("h", [axis(4, 4.0)]))
        .unwrap();
    let key = store.get_key("/a/", "h").unwrap().clone();
    store.remove(&key).unwrap();
    handle.fill([1.0], 1);
}

#[test]
fn clear_invalidates_everything() {
    let mut store = BookStore::new(1);
    book_three(&mut store);
    let all = store.find(Condition::always());
    store.clear();
    assert_eq!(store.len(), 0);
    assert!(all.iter().all(|w| !w.valid()));
}

#[test]
fn default_flags_resolve_against_store_configuration() {
    let mut store = BookStore::new(4);
    store.set_default_layout(LayoutKind::MultiCopy);
    store.set_store_by_default(true);
    store
        .book("/d/", "h", BookFlag::DEFAULT, || {
            H1I::new("h", [axis(2, 2.0)])
        })
        .unwrap();
    let key = store.get_key("/d/", "h").unwrap();
    assert!(key.flags.contains(BookFlag::MULTI_COPY));
    assert!(key.flags.contains(BookFlag::STORE));
    assert_eq!(key.amt, 4);

    // Explicit layout without STORE does not inherit store-by-default.
    store
        .book("/d/", "g", BookFlag::SINGLE, || {
            H1I::new("g", [axis(2, 2.0)])
        })
        .unwrap();
    let key = store.get_key("/d/", "g").unwrap();
    assert!(!key.flags.contains(BookFlag::STORE));
    assert_eq!(key.amt, 1);
}

#[test]
fn unregistered_merge_fails_fast_at_booking() {
    #[derive(Clone, Serialize)]
    struct Blob(Vec<u64>);
    impl Fillable for Blob {
        type Coord = usize;
        type Weight = u64;
        fn fill_one(&mut self, coord: usize, weight: u64) {
            self.0[coord] += weight;
        }
    }

    let mut store = BookStore::new(2);
    let err = store
        .book_multi_copy("/x/", "blob", || Blob(vec![0; 8]))
        .unwrap_err();
    assert!(matches!(err, BookError::UnsupportedMerge { .. }));
    // Single layout needs no merge function.
    store.book_single("/x/", "blob", || Blob(vec![0; 8])).unwrap();
}

#[test]
fn concurrent_buffered_fill_loses_and_duplicates_nothing() {
    let mut store = BookStore::new(4);
    let handle = store
        .book_multi_shared("/c/", "h", || H1F::new("h", [axis(16, 16.0)]))
        .unwrap();
    let handle = Arc::new(handle);

    // Deterministic per-worker coordinate sequences.
    let threads: Vec<_> = (0..4)
        .map(|worker| {
            let handle = handle.clone();
            std::thread::spawn(move || {
                set_worker_index(worker);
                for i in 0..10_000u32 {
                    let coord = f64::from((i.wrapping_mul(7).wrapping_add(worker as u32)) % 16);
                    handle.fill([coord], 1.0);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    // Reference: the same 40 000 fills applied sequentially.
    let mut expected = H1F::new("h", [axis(16, 16.0)]);
    for worker in 0..4u32 {
        for i in 0..10_000u32 {
            let coord = f64::from((i.wrapping_mul(7).wrapping_add(worker)) % 16);
            expected.fill([coord], 1.0);
        }
    }

    let merged = handle.merged();
    assert_eq!(merged.entries(), 40_000);
    for k in 0..16 {
        assert_eq!(
            merged.bin_content([k]),
            expected.bin_content([k]),
            "bin {k} must match the single-threaded sum exactly"
        );
    }
}
