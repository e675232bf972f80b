//! Exercises the per-event extension surface; doubles as a smoke-test
//! processor for new setups.

use std::sync::atomic::{AtomicU64, Ordering};

use core_events::{EventStore, RunHeader};
use core_plugin::{
    api, declare_processor, Component, ComponentBase, InitContext, ProcessingError, Processor,
};
use tracing::{debug, info};

/// Counts runs and events and publishes return values downstream chains can
/// branch on: the unnamed value (always true), `Calibrating` (every third
/// event) and `EvenNumberOfEvents`.
pub struct EventCounter {
    base: ComponentBase,
    runs: AtomicU64,
    events: AtomicU64,
}

impl EventCounter {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("EventCounter");
        base.set_description("Counts events and publishes example return values");
        Self {
            base,
            runs: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    pub fn events_seen(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn runs_seen(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

impl Default for EventCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for EventCounter {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

impl Processor for EventCounter {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_run_header(&self, header: &RunHeader) -> Result<(), ProcessingError> {
        debug!(
            target: "runtime.processor",
            name = self.name(),
            run = header.run_number(),
            "run_header"
        );
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError> {
        let count = self.events.fetch_add(1, Ordering::Relaxed);
        if api::is_first_event(event) {
            debug!(
                target: "runtime.processor",
                name = self.name(),
                uid = event.uid(),
                "first_event"
            );
        }
        let calibrating = count % 3 == 0;
        api::set_named_return_value(self, event, "Calibrating", calibrating);
        api::set_return_value(self, event, true);
        api::set_named_return_value(self, event, "EvenNumberOfEvents", count % 2 == 0);
        Ok(())
    }

    fn end(&self) -> Result<(), ProcessingError> {
        info!(
            target: "runtime.processor",
            name = self.name(),
            events = self.events.load(Ordering::Relaxed),
            runs = self.runs.load(Ordering::Relaxed),
            "event_counter_summary"
        );
        Ok(())
    }

}

declare_processor!("EventCounter", EventCounter);
