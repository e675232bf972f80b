//! Memory layouts: the storage strategy behind a booked entry.
//!
//! Three strategies exist, chosen by booking flags:
//! - [`SingleLayout`]: one instance behind one lock. Fills serialize on that
//!   lock; intended for single-threaded use or types with cheap fills.
//! - [`SharedLayout`]: one independent instance per worker; fills go to the
//!   calling worker's own instance so they never contend. `merged()`
//!   reconstructs a fresh instance from the captured constructor and folds
//!   every worker instance through the registered merge function on every
//!   call, so fills between calls are always reflected.
//! - [`BufferedLayout`]: one backing instance plus per-worker fill buffers
//!   that flush under the backing lock on overflow, explicit flush, or read.
//!
//! All layouts expose a type-erased [`MemLayout`] view used by the store for
//! writing; handles keep typed `Arc`s and never downcast.

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::hist::Fillable;
use crate::merge::ErasedMerge;
use crate::worker::worker_index;

/// Capacity of one per-worker fill buffer. Larger values trade memory for
/// fewer synchronization points on the backing lock.
pub const FILL_BUFFER_CAP: usize = 1024;

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Type-erased view of a layout, enough for the store and the writer.
pub trait MemLayout: Send + Sync + 'static {
    /// Number of backing instances.
    fn amt(&self) -> usize;

    /// A boxed clone of the merged instance, recomputed per call.
    fn merged_any(&self) -> Box<dyn Any + Send>;
}

/// One instance, one lock.
pub struct SingleLayout<T: Fillable> {
    instance: Mutex<T>,
}

impl<T: Fillable> SingleLayout<T> {
    pub fn new(instance: T) -> Self {
        Self {
            instance: Mutex::new(instance),
        }
    }

    pub fn with_instance<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut lock_ignore_poison(&self.instance))
    }

    /// Indexed access for interface parity with multi-instance layouts:
    /// every index maps to the one instance.
    pub fn with_instance_at<R>(&self, _idx: usize, f: impl FnOnce(&mut T) -> R) -> R {
        self.with_instance(f)
    }

    pub fn merged(&self) -> T {
        lock_ignore_poison(&self.instance).clone()
    }
}

impl<T: Fillable> MemLayout for SingleLayout<T> {
    fn amt(&self) -> usize {
        1
    }

    fn merged_any(&self) -> Box<dyn Any + Send> {
        Box::new(self.merged())
    }
}

/// One instance per worker, merged on read.
pub struct SharedLayout<T: Fillable> {
    make: Box<dyn Fn() -> T + Send + Sync>,
    merge: ErasedMerge,
    instances: Vec<Mutex<T>>,
}

impl<T: Fillable> SharedLayout<T> {
    pub fn new(amt: usize, make: impl Fn() -> T + Send + Sync + 'static, merge: ErasedMerge) -> Self {
        let instances = (0..amt.max(1)).map(|_| Mutex::new(make())).collect();
        Self {
            make: Box::new(make),
            merge,
            instances,
        }
    }

    /// Fill the calling worker's instance. Uncontended when each worker
    /// keeps to its own slot.
    pub fn fill_slot(&self, coord: T::Coord, weight: T::Weight) {
        let slot = worker_index() % self.instances.len();
        lock_ignore_poison(&self.instances[slot]).fill_one(coord, weight);
    }

    /// Access the `idx`-th backing instance; `idx < amt()`.
    pub fn with_instance_at<R>(&self, idx: usize, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut lock_ignore_poison(&self.instances[idx]))
    }

    /// Rebuild a fresh instance and fold every worker instance into it.
    pub fn merged(&self) -> T {
        let mut out = (self.make)();
        for instance in &self.instances {
            let guard = lock_ignore_poison(instance);
            (self.merge)(&mut out, &*guard);
        }
        out
    }
}

impl<T: Fillable> MemLayout for SharedLayout<T> {
    fn amt(&self) -> usize {
        self.instances.len()
    }

    fn merged_any(&self) -> Box<dyn Any + Send> {
        Box::new(self.merged())
    }
}

/// One backing instance, per-worker buffered fills.
pub struct BufferedLayout<T: Fillable> {
    backing: Mutex<T>,
    buffers: Vec<Mutex<Vec<(T::Coord, T::Weight)>>>,
}

impl<T: Fillable> BufferedLayout<T> {
    pub fn new(instance: T, workers: usize) -> Self {
        let buffers = (0..workers.max(1))
            .map(|_| Mutex::new(Vec::with_capacity(FILL_BUFFER_CAP)))
            .collect();
        Self {
            backing: Mutex::new(instance),
            buffers,
        }
    }

    /// Buffer a fill in the calling worker's buffer, flushing into the
    /// backing instance when the buffer is full.
    pub fn fill_buffered(&self, coord: T::Coord, weight: T::Weight) {
        let slot = worker_index() % self.buffers.len();
        let mut buffer = lock_ignore_poison(&self.buffers[slot]);
        buffer.push((coord, weight));
        if buffer.len() >= FILL_BUFFER_CAP {
            let pending = std::mem::take(&mut *buffer);
            drop(buffer);
            lock_ignore_poison(&self.backing).fill_many(&pending);
        }
    }

    /// Flush every worker buffer into the backing instance.
    pub fn flush(&self) {
        for buffer in &self.buffers {
            let pending = std::mem::take(&mut *lock_ignore_poison(buffer));
            if !pending.is_empty() {
                lock_ignore_poison(&self.backing).fill_many(&pending);
            }
        }
    }

    /// Flush, then clone the backing instance.
    pub fn merged(&self) -> T {
        self.flush();
        lock_ignore_poison(&self.backing).clone()
    }
}

impl<T: Fillable> MemLayout for BufferedLayout<T> {
    fn amt(&self) -> usize {
        1
    }

    fn merged_any(&self) -> Box<dyn Any + Send> {
        Box::new(self.merged())
    }
}
