//! Single-slot synchronous scheduler.
//!
//! One sequence, executed on the calling thread inside `push_event`. Useful
//! for debugging processor chains without any concurrency in play.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use core_events::{EventStore, RandomSeedManager, RandomSeeds, RunHeader};
use core_plugin::{
    declare_scheduler, Component, ComponentBase, Scheduler, SchedulerContext, SchedulerError,
};
use tracing::info;

use crate::sequence::{EventOutcome, SuperSequence};

/// Synchronous scheduler with a single slot.
pub struct SimpleScheduler {
    base: ComponentBase,
    super_sequence: Option<SuperSequence>,
    seeds: Option<RandomSeedManager>,
    finished: Mutex<VecDeque<EventStore>>,
    draining: AtomicBool,
}

impl SimpleScheduler {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("SimpleScheduler");
        base.set_description("Synchronous single-slot scheduler");
        Self {
            base,
            super_sequence: None,
            seeds: None,
            finished: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    fn sequences(&self) -> Result<&SuperSequence, SchedulerError> {
        self.super_sequence
            .as_ref()
            .ok_or_else(|| SchedulerError::Processor {
                name: self.name().to_string(),
                phase: "processEvent",
                message: "scheduler used before initialize".to_string(),
            })
    }
}

impl Default for SimpleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SimpleScheduler {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

impl Scheduler for SimpleScheduler {
    fn initialize(&mut self, ctx: &mut SchedulerContext<'_>) -> Result<(), SchedulerError> {
        let super_sequence = SuperSequence::build(ctx, 1)?;
        info!(
            target: "runtime.scheduler",
            instances = super_sequence.instance_count(),
            "simple_scheduler_ready"
        );
        ctx.seeds.close();
        self.seeds = Some(ctx.seeds.clone());
        self.super_sequence = Some(super_sequence);
        Ok(())
    }

    fn process_run_header(&self, header: RunHeader) -> Result<(), SchedulerError> {
        self.sequences()?.process_run_header(&header)
    }

    fn push_event(&self, mut event: EventStore) -> Result<(), SchedulerError> {
        let sequences = self.sequences()?;
        if let Some(seeds) = &self.seeds {
            let seeds = RandomSeeds::new(seeds.seeds_for(event.uid()));
            event.extensions_mut().insert(seeds);
        }
        let outcome = sequences.sequence(0).process_event(&mut event)?;
        if outcome == EventOutcome::Stop {
            self.draining.store(true, Ordering::Release);
        }
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
        Ok(())
    }

    fn pop_finished_events(&self, out: &mut Vec<EventStore>) {
        out.extend(
            self.finished
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..),
        );
    }

    fn free_slots(&self) -> usize {
        let occupied = !self
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty();
        usize::from(!occupied)
    }

    fn stop_requested(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    fn end(&self) -> Result<(), SchedulerError> {
        let sequences = self.sequences()?;
        sequences.end()?;
        sequences.log_statistics();
        Ok(())
    }
}

declare_scheduler!("Simple", SimpleScheduler);
