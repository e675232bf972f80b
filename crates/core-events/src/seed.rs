//! Deterministic per-processor random seeds.
//!
//! Processors that need reproducible randomness register during init; the
//! scheduler then asks for one 32-bit seed per registered processor per
//! event. Seeds are derived arithmetically from (global seed, event uid,
//! registration order), so a fixed configuration yields the same seeds on
//! every run regardless of thread count.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Process-unique identity of a component instance. Allocation order is the
/// construction order, which is stable for a fixed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

impl ProcessorId {
    /// Allocate the next id. Called once per component construction.
    pub fn next() -> Self {
        ProcessorId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Registry of seed consumers plus the derivation itself.
///
/// Cloneable so a scheduler can snapshot the closed registry and derive
/// seeds without further coordination.
#[derive(Debug, Clone)]
pub struct RandomSeedManager {
    global_seed: u32,
    /// Registration order determines the draw order, so it is part of the
    /// deterministic contract.
    registered: Vec<ProcessorId>,
    closed: bool,
}

impl Default for RandomSeedManager {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GLOBAL_SEED)
    }
}

impl RandomSeedManager {
    pub const DEFAULT_GLOBAL_SEED: u32 = 0x1234_5678;

    pub fn new(global_seed: u32) -> Self {
        Self {
            global_seed,
            registered: Vec::new(),
            closed: false,
        }
    }

    pub fn global_seed(&self) -> u32 {
        self.global_seed
    }

    /// Register a seed consumer. Registration closes when event processing
    /// starts; late registration is a programming error.
    pub fn register(&mut self, id: ProcessorId) {
        assert!(
            !self.closed,
            "random seed registration after event processing started"
        );
        if !self.registered.contains(&id) {
            debug!(target: "runtime.seeds", id = id.raw(), "seed_consumer_registered");
            self.registered.push(id);
        }
    }

    /// Close registration. Called by the scheduler before the first event.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_registered(&self, id: ProcessorId) -> bool {
        self.registered.contains(&id)
    }

    /// Derive the per-processor seeds for one event uid, in registration
    /// order from a splitmix64 stream keyed by (global seed, uid).
    pub fn seeds_for(&self, uid: u32) -> HashMap<ProcessorId, u32> {
        let mut state = (u64::from(self.global_seed) << 32) | u64::from(uid);
        self.registered
            .iter()
            .map(|&id| (id, splitmix64(&mut state) as u32))
            .collect()
    }
}
