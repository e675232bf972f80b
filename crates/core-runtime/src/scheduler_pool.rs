//! Worker-pool scheduler.
//!
//! `W` OS threads each own one sequence. The producer hands events into a
//! bounded slot pool (mutex + not-empty / not-full condition variables);
//! workers push finished events onto an unbounded completion channel drained
//! by `pop_finished_events` without blocking. A slot stays occupied from
//! `push_event` until the finished event reaches the completion channel, so
//! `free_slots() + active == W` holds at every instant.
//!
//! Run headers take the idle barrier: the producer waits until every slot is
//! free, then broadcasts on its own thread. Since the producer is the only
//! source of new events, every worker observes headers in emission order and
//! before any event pushed after them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use core_book::set_worker_index;
use core_events::{EventStore, RandomSeedManager, RandomSeeds, RunHeader};
use core_plugin::{
    declare_scheduler, Component, ComponentBase, Scheduler, SchedulerContext, SchedulerError,
};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info};

use crate::sequence::{EventOutcome, Sequence, SuperSequence};

struct PoolState {
    queue: VecDeque<EventStore>,
    /// Events pushed and not yet surfaced on the completion channel.
    active: usize,
    join: bool,
    /// First fatal processor failure, reported at `end`.
    fatal: Option<(String, String)>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    not_empty: Condvar,
    not_full: Condvar,
    idle: Condvar,
    draining: AtomicBool,
    completed_tx: Sender<EventStore>,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct PoolInner {
    shared: Arc<PoolShared>,
    completed_rx: Receiver<EventStore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    super_sequence: Arc<SuperSequence>,
    seeds: RandomSeedManager,
    capacity: usize,
}

/// Multi-threaded scheduler with a fixed worker pool.
pub struct WorkerPoolScheduler {
    base: ComponentBase,
    inner: Option<PoolInner>,
}

impl WorkerPoolScheduler {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("WorkerPoolScheduler");
        base.set_description("Fixed worker pool with a bounded input queue");
        Self { base, inner: None }
    }

    fn inner(&self) -> Result<&PoolInner, SchedulerError> {
        self.inner.as_ref().ok_or_else(|| SchedulerError::Processor {
            name: self.name().to_string(),
            phase: "processEvent",
            message: "scheduler used before initialize".to_string(),
        })
    }
}

impl Default for WorkerPoolScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(shared: Arc<PoolShared>, sequence: Arc<Sequence>, worker: usize) {
    set_worker_index(worker);
    loop {
        let mut state = shared.lock();
        while state.queue.is_empty() && !state.join {
            state = shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let Some(mut event) = state.queue.pop_front() else {
            // Join requested and nothing left to drain.
            break;
        };
        drop(state);

        match sequence.process_event(&mut event) {
            Ok(EventOutcome::Stop) => {
                shared.draining.store(true, Ordering::Release);
            }
            Ok(_) => {}
            Err(err) => {
                error!(target: "runtime.scheduler", worker, error = %err, "event_processing_failed");
                shared.draining.store(true, Ordering::Release);
                let mut state = shared.lock();
                if state.fatal.is_none() {
                    state.fatal = Some((format!("worker-{worker}"), err.to_string()));
                }
            }
        }

        // The event leaves its slot only once it is visible to
        // pop_finished_events.
        if shared.completed_tx.send(event).is_err() {
            break;
        }
        let mut state = shared.lock();
        state.active -= 1;
        if state.active == 0 {
            shared.idle.notify_all();
        }
        drop(state);
        shared.not_full.notify_one();
    }
}

impl Component for WorkerPoolScheduler {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

impl Scheduler for WorkerPoolScheduler {
    fn initialize(&mut self, ctx: &mut SchedulerContext<'_>) -> Result<(), SchedulerError> {
        let workers = ctx.workers.max(1);
        let super_sequence = Arc::new(SuperSequence::build(ctx, workers)?);
        ctx.seeds.close();
        let seeds = ctx.seeds.clone();

        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::with_capacity(workers),
                active: 0,
                join: false,
                fatal: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            idle: Condvar::new(),
            draining: AtomicBool::new(false),
            completed_tx,
        });

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let shared = shared.clone();
            let sequence = super_sequence.sequence(worker);
            let handle = std::thread::Builder::new()
                .name(format!("eventide-worker-{worker}"))
                .spawn(move || worker_loop(shared, sequence, worker))
                .map_err(|e| SchedulerError::Spawn(e.to_string()))?;
            handles.push(handle);
        }

        info!(
            target: "runtime.scheduler",
            workers,
            instances = super_sequence.instance_count(),
            "worker_pool_ready"
        );
        self.inner = Some(PoolInner {
            shared,
            completed_rx,
            workers: Mutex::new(handles),
            super_sequence,
            seeds,
            capacity: workers,
        });
        Ok(())
    }

    fn process_run_header(&self, header: RunHeader) -> Result<(), SchedulerError> {
        let inner = self.inner()?;
        {
            let mut state = inner.shared.lock();
            while state.active > 0 {
                state = inner
                    .shared
                    .idle
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        // All workers idle and the producer is the only source of new
        // events: the broadcast is ordered before anything pushed later.
        inner.super_sequence.process_run_header(&header)
    }

    fn push_event(&self, mut event: EventStore) -> Result<(), SchedulerError> {
        let inner = self.inner()?;
        let seeds = RandomSeeds::new(inner.seeds.seeds_for(event.uid()));
        event.extensions_mut().insert(seeds);
        let mut state = inner.shared.lock();
        while state.active >= inner.capacity {
            state = inner
                .shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.queue.push_back(event);
        state.active += 1;
        drop(state);
        inner.shared.not_empty.notify_one();
        Ok(())
    }

    fn pop_finished_events(&self, out: &mut Vec<EventStore>) {
        if let Ok(inner) = self.inner() {
            out.extend(inner.completed_rx.try_iter());
        }
    }

    fn free_slots(&self) -> usize {
        match self.inner() {
            Ok(inner) => inner.capacity - inner.shared.lock().active,
            Err(_) => 0,
        }
    }

    fn stop_requested(&self) -> bool {
        match self.inner() {
            Ok(inner) => {
                inner.shared.draining.load(Ordering::Acquire)
                    || inner.shared.lock().fatal.is_some()
            }
            Err(_) => false,
        }
    }

    fn end(&self) -> Result<(), SchedulerError> {
        let inner = self.inner()?;
        {
            let mut state = inner.shared.lock();
            while state.active > 0 {
                state = inner
                    .shared
                    .idle
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            state.join = true;
        }
        inner.shared.not_empty.notify_all();
        let handles: Vec<JoinHandle<()>> = inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                error!(target: "runtime.scheduler", "worker_panicked");
            }
        }
        inner.super_sequence.end()?;
        inner.super_sequence.log_statistics();
        let fatal = inner.shared.lock().fatal.take();
        if let Some((worker, message)) = fatal {
            return Err(SchedulerError::Processor {
                name: worker,
                phase: "processEvent",
                message,
            });
        }
        info!(target: "runtime.scheduler", "worker_pool_terminated");
        Ok(())
    }
}

declare_scheduler!("WorkerPool", WorkerPoolScheduler);
