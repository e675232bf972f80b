//! Helpers processors call from their hooks.
//!
//! Thin wrappers over the event extensions bag, mirroring the lifecycle
//! contract: seed registration happens in `init`, everything else during
//! `process_event` on the worker owning the event.

use core_events::{EventStore, IsFirstEvent, ProcessorConditions, RandomSeeds};
use tracing::warn;

use crate::processor::{InitContext, Processor};
use crate::ProcessingError;

/// Register the processor as a random-seed consumer. Call from `init`.
pub fn register_for_random_seeds(proc: &dyn Processor, ctx: &mut InitContext<'_>) {
    ctx.seeds.register(proc.id());
}

/// The processor's seed for this event. Requires prior registration.
pub fn random_seed(proc: &dyn Processor, event: &EventStore) -> Result<u32, ProcessingError> {
    event
        .extensions()
        .get::<RandomSeeds>()
        .and_then(|seeds| seeds.seed(proc.id()))
        .ok_or_else(|| {
            ProcessingError::fatal(format!(
                "no random seed for processor '{}'; register in init",
                proc.name()
            ))
        })
}

/// Record the processor's unnamed boolean return value for this event.
pub fn set_return_value(proc: &dyn Processor, event: &mut EventStore, value: bool) {
    event
        .extensions_mut()
        .get_or_insert_with(ProcessorConditions::default)
        .set(proc.id(), value);
}

/// Record a named return value, scoped by the processor name.
pub fn set_named_return_value(
    proc: &dyn Processor,
    event: &mut EventStore,
    name: &str,
    value: bool,
) {
    event
        .extensions_mut()
        .get_or_insert_with(ProcessorConditions::default)
        .set_named(proc.name(), name, value);
}

/// Whether this is the first event pushed into the pipeline.
pub fn is_first_event(event: &EventStore) -> bool {
    event
        .extensions()
        .get::<IsFirstEvent>()
        .is_some_and(|flag| flag.0)
}

/// Skip the remaining processors for the current event.
pub fn skip_event(proc: &dyn Processor) -> ProcessingError {
    warn!(target: "runtime.processor", processor = proc.name(), "skipping current event");
    ProcessingError::SkipEvent
}

/// Request a clean stop of event processing.
pub fn abort(proc: &dyn Processor, reason: &str) -> ProcessingError {
    warn!(
        target: "runtime.processor",
        processor = proc.name(),
        reason,
        "stopping event processing"
    );
    ProcessingError::StopProcessing
}
