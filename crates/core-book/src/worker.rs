//! Worker-slot identity for fills.
//!
//! Per-worker-copy and buffered layouts pick their slot from the calling
//! thread's worker index, set once by the scheduler when it spawns its
//! workers. Threads that never set an index (the driver thread, tests) use
//! slot 0.

use std::cell::Cell;

thread_local! {
    static WORKER_INDEX: Cell<usize> = const { Cell::new(0) };
}

/// Bind this thread to a worker slot.
pub fn set_worker_index(index: usize) {
    WORKER_INDEX.set(index);
}

/// The current thread's worker slot.
pub fn worker_index() -> usize {
    WORKER_INDEX.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_slot_zero() {
        assert_eq!(worker_index(), 0);
    }

    #[test]
    fn index_is_per_thread() {
        set_worker_index(3);
        let other = std::thread::spawn(|| {
            assert_eq!(worker_index(), 0, "fresh thread starts at slot 0");
            set_worker_index(1);
            worker_index()
        })
        .join()
        .unwrap();
        assert_eq!(other, 1);
        assert_eq!(worker_index(), 3, "other thread must not leak its index");
        set_worker_index(0);
    }
}
