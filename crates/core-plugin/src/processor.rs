//! The user compute unit.

use core_book::BookStore;
use core_events::{EventStore, RandomSeedManager, RunHeader};

use crate::component::Component;
use crate::ProcessingError;

/// Runtime behavior switches a processor may force in code. Unforced options
/// fall back to the steering section (`Clone` / `Critical` keys) and then to
/// `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOption {
    /// Only one event may execute this processor at a time.
    Critical,
    /// Duplicate the processor per worker instead of sharing one instance.
    Clone,
}

/// Facilities available to `init`: booking and seed registration. Store
/// mutation is only permitted here and in teardown, never while events are
/// in flight.
pub struct InitContext<'a> {
    pub workers: usize,
    pub book: &'a mut BookStore,
    pub seeds: &'a mut RandomSeedManager,
}

/// A processor in an ordered chain.
///
/// Hooks run under the concurrency regime selected by the runtime options:
/// `process_event` takes `&self` because a shared (non-cloned) instance is
/// invoked from several workers; internal state wants atomics.
pub trait Processor: Component {
    /// Called once after parameters are bound, before any event.
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ProcessingError>;

    /// Broadcast once per incoming run header, on the producing thread.
    fn process_run_header(&self, _header: &RunHeader) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError>;

    /// Teardown, called at most once per instance.
    fn end(&self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// A forced runtime option, or `None` to defer to configuration.
    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        None
    }
}
