//! Slot-based event dispatchers.

use core_book::BookStore;
use core_config::Configuration;
use core_events::{EventStore, RandomSeedManager, RunHeader};

use crate::component::Component;
use crate::manager::PluginManager;
use crate::SchedulerError;

/// Everything a scheduler needs to materialize its processor sequences.
pub struct SchedulerContext<'a> {
    /// Worker count resolved by the application (steering plus overrides).
    pub workers: usize,
    pub config: &'a Configuration,
    pub plugins: &'a PluginManager,
    pub book: &'a mut BookStore,
    pub seeds: &'a mut RandomSeedManager,
}

/// Dispatches events into processor sequences across worker slots.
///
/// After `initialize`, the whole surface is `&self`: schedulers synchronize
/// internally so the producer can drive them through shared references.
pub trait Scheduler: Component {
    /// Build sequences from `[execute]` and `[processors.*]`, spawn workers.
    fn initialize(&mut self, ctx: &mut SchedulerContext<'_>) -> Result<(), SchedulerError>;

    /// Broadcast a run header to every processor instance, synchronously on
    /// the calling thread. Headers are globally ordered with respect to
    /// subsequently pushed events.
    fn process_run_header(&self, header: RunHeader) -> Result<(), SchedulerError>;

    /// Hand one event to a free slot. Blocks while no slot is free.
    fn push_event(&self, event: EventStore) -> Result<(), SchedulerError>;

    /// Drain completed events without blocking.
    fn pop_finished_events(&self, out: &mut Vec<EventStore>);

    /// Remaining input capacity. `free_slots() + active events == workers`
    /// at all times.
    fn free_slots(&self) -> usize;

    /// True once a processor requested a stop; the producer must stop
    /// reading while in-flight events drain.
    fn stop_requested(&self) -> bool;

    /// Wait for all workers to idle, run teardown hooks, join workers.
    fn end(&self) -> Result<(), SchedulerError>;
}
