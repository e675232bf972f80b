//! Processor sequences.
//!
//! A [`Sequence`] is the ordered chain one worker executes per event. The
//! [`SuperSequence`] materializes `W` parallel sequences from the `[execute]`
//! list, honoring each processor's runtime options:
//!
//! - `Clone = true`: every sequence gets its own instance;
//! - `Clone = false`: one instance is shared by all sequences, and with
//!   `Critical = true` every call is serialized through a mutex facade.
//!
//! Run headers and teardown touch each unique instance exactly once,
//! whatever the sharing; per-instance counters feed the end-of-run
//! statistics report.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use core_config::{ConfigError, ConfigSection};
use core_events::{EventStore, ProcessorConditions, RunHeader};
use core_plugin::{
    InitContext, ProcessingError, Processor, RuntimeOption, SchedulerContext, SchedulerError,
};
use tracing::{debug, error, info};

/// What became of one event after its trip through a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Every processor ran.
    Completed,
    /// A processor skipped the remainder; the event still completed.
    Skipped,
    /// A processor requested a stop of event processing.
    Stop,
}

#[derive(Default)]
struct ProcessorStats {
    events: AtomicU64,
    nanos: AtomicU64,
}

impl ProcessorStats {
    fn record(&self, elapsed: std::time::Duration) {
        self.events.fetch_add(1, Ordering::Relaxed);
        self.nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }
}

struct SequenceSlot {
    proc: Arc<dyn Processor>,
    /// Present for shared critical instances; serializes `process_event`.
    guard: Option<Arc<Mutex<()>>>,
    stats: Arc<ProcessorStats>,
}

/// Ordered processor chain executed serially on one worker.
pub struct Sequence {
    slots: Vec<SequenceSlot>,
}

impl Sequence {
    /// Run one event through the chain.
    pub fn process_event(&self, event: &mut EventStore) -> Result<EventOutcome, SchedulerError> {
        // The condition bag exists before the first processor looks at it.
        event
            .extensions_mut()
            .get_or_insert_with(ProcessorConditions::default);
        for slot in &self.slots {
            let started = Instant::now();
            let result = match &slot.guard {
                Some(lock) => {
                    let _serialized = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    slot.proc.process_event(event)
                }
                None => slot.proc.process_event(event),
            };
            slot.stats.record(started.elapsed());
            match result {
                Ok(()) => {}
                Err(ProcessingError::SkipEvent) => return Ok(EventOutcome::Skipped),
                Err(ProcessingError::StopProcessing) => return Ok(EventOutcome::Stop),
                Err(err) => {
                    return Err(SchedulerError::Processor {
                        name: slot.proc.name().to_string(),
                        phase: "processEvent",
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(EventOutcome::Completed)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

struct ProcessorInstance {
    proc: Arc<dyn Processor>,
    stats: Arc<ProcessorStats>,
    ended: AtomicBool,
}

/// The `W` parallel sequences plus unique-instance bookkeeping.
pub struct SuperSequence {
    sequences: Vec<Arc<Sequence>>,
    instances: Vec<ProcessorInstance>,
}

/// Effective runtime option: forced by code, else steering, else `true`.
fn effective_option(
    forced: Option<bool>,
    section: &ConfigSection,
    key: &str,
) -> bool {
    forced
        .or_else(|| match section.get_scalar(key) {
            Some("true") | Some("1") => Some(true),
            Some("false") | Some("0") => Some(false),
            _ => None,
        })
        .unwrap_or(true)
}

impl SuperSequence {
    /// Materialize `workers` sequences from `[execute]` and `[processors.*]`.
    pub fn build(
        ctx: &mut SchedulerContext<'_>,
        workers: usize,
    ) -> Result<SuperSequence, SchedulerError> {
        let workers = workers.max(1);
        let active = ctx.config.active_processors();
        if active.is_empty() {
            return Err(SchedulerError::EmptyExecuteList);
        }
        let processors_section = ctx.config.require_section("processors")?;

        let mut slots: Vec<Vec<SequenceSlot>> = (0..workers).map(|_| Vec::new()).collect();
        let mut instances = Vec::new();

        for name in &active {
            let section = processors_section.section(name).ok_or_else(|| {
                ConfigError::MissingSection(format!("processors.{name}"))
            })?;
            let type_name = section
                .get_scalar("type")
                .ok_or_else(|| ConfigError::UnknownParameter(format!("processors.{name}.type")))?
                .to_string();

            let make = |ctx: &SchedulerContext<'_>| -> Result<Box<dyn Processor>, SchedulerError> {
                let mut proc = ctx.plugins.create_processor(&type_name)?;
                proc.base_mut().set_name(name.as_str());
                proc.set_parameters(section)?;
                Ok(proc)
            };

            let first = make(ctx)?;
            let clone = effective_option(first.runtime_option(RuntimeOption::Clone), section, "Clone");
            let critical =
                effective_option(first.runtime_option(RuntimeOption::Critical), section, "Critical");
            debug!(
                target: "runtime.sequence",
                processor = name.as_str(),
                plugin_type = type_name.as_str(),
                clone,
                critical,
                "processor_materialized"
            );

            if clone {
                // One instance per sequence; per-worker isolation makes the
                // critical lock unnecessary.
                let mut fresh = vec![first];
                for _ in 1..workers {
                    fresh.push(make(ctx)?);
                }
                for (worker, mut proc) in fresh.into_iter().enumerate() {
                    init_processor(proc.as_mut(), ctx, workers)?;
                    let proc: Arc<dyn Processor> = Arc::from(proc);
                    let stats = Arc::new(ProcessorStats::default());
                    instances.push(ProcessorInstance {
                        proc: proc.clone(),
                        stats: stats.clone(),
                        ended: AtomicBool::new(false),
                    });
                    slots[worker].push(SequenceSlot {
                        proc,
                        guard: None,
                        stats,
                    });
                }
            } else {
                let mut proc = first;
                init_processor(proc.as_mut(), ctx, workers)?;
                let proc: Arc<dyn Processor> = Arc::from(proc);
                let stats = Arc::new(ProcessorStats::default());
                let guard = critical.then(|| Arc::new(Mutex::new(())));
                instances.push(ProcessorInstance {
                    proc: proc.clone(),
                    stats: stats.clone(),
                    ended: AtomicBool::new(false),
                });
                for worker_slots in &mut slots {
                    worker_slots.push(SequenceSlot {
                        proc: proc.clone(),
                        guard: guard.clone(),
                        stats: stats.clone(),
                    });
                }
            }
        }

        Ok(SuperSequence {
            sequences: slots
                .into_iter()
                .map(|slots| Arc::new(Sequence { slots }))
                .collect(),
            instances,
        })
    }

    pub fn workers(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequence(&self, worker: usize) -> Arc<Sequence> {
        self.sequences[worker].clone()
    }

    /// Number of distinct processor instances across all sequences.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Broadcast a run header to every unique instance, in chain order.
    pub fn process_run_header(&self, header: &RunHeader) -> Result<(), SchedulerError> {
        for instance in &self.instances {
            instance.proc.process_run_header(header).map_err(|err| {
                SchedulerError::Processor {
                    name: instance.proc.name().to_string(),
                    phase: "processRunHeader",
                    message: err.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Run `end` on every instance at most once. All instances are torn
    /// down even when one fails; the first failure is reported.
    pub fn end(&self) -> Result<(), SchedulerError> {
        let mut first_failure = None;
        for instance in &self.instances {
            if instance.ended.swap(true, Ordering::AcqRel) {
                continue;
            }
            if let Err(err) = instance.proc.end() {
                error!(
                    target: "runtime.sequence",
                    processor = instance.proc.name(),
                    error = %err,
                    "processor_end_failed"
                );
                first_failure.get_or_insert(SchedulerError::Processor {
                    name: instance.proc.name().to_string(),
                    phase: "end",
                    message: err.to_string(),
                });
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Log per-instance event counts and mean processing time.
    pub fn log_statistics(&self) {
        for instance in &self.instances {
            let events = instance.stats.events.load(Ordering::Relaxed);
            let nanos = instance.stats.nanos.load(Ordering::Relaxed);
            let mean_us = if events > 0 {
                (nanos / events) as f64 / 1_000.0
            } else {
                0.0
            };
            info!(
                target: "runtime.sequence",
                processor = instance.proc.name(),
                events,
                mean_us,
                "processor_statistics"
            );
        }
    }
}

fn init_processor(
    proc: &mut dyn Processor,
    ctx: &mut SchedulerContext<'_>,
    workers: usize,
) -> Result<(), SchedulerError> {
    let mut init_ctx = InitContext {
        workers,
        book: &mut *ctx.book,
        seeds: &mut *ctx.seeds,
    };
    proc.init(&mut init_ctx).map_err(|err| SchedulerError::Processor {
        name: proc.name().to_string(),
        phase: "init",
        message: err.to_string(),
    })
}
