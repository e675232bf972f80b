//! Periodic progress reporting.

use std::sync::atomic::{AtomicU64, Ordering};

use core_events::EventStore;
use core_plugin::{
    declare_processor, Component, ComponentBase, InitContext, ProcessingError, Processor,
    RuntimeOption,
};
use tracing::{debug, info};

/// Prints a status line every `HowOften` events. Counting is sequential
/// across workers, not the event or run ids.
pub struct StatusMonitor {
    base: ComponentBase,
    how_often: u64,
    runs: AtomicU64,
    events: AtomicU64,
}

impl StatusMonitor {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("StatusMonitor");
        base.set_description("Prints the processed run and event count every HowOften events");
        base.parameters_mut()
            .register::<u64>("HowOften", "Print a status line every N events", Some(1))
            .expect("fresh parameter set");
        Self {
            base,
            how_often: 1,
            runs: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    pub fn events_seen(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for StatusMonitor {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

impl Processor for StatusMonitor {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        self.how_often = self
            .base
            .parameters()
            .get::<u64>("HowOften")
            .unwrap_or(1)
            .max(1);
        debug!(target: "runtime.processor", name = self.name(), how_often = self.how_often, "status_monitor_ready");
        Ok(())
    }

    fn process_run_header(
        &self,
        _header: &core_events::RunHeader,
    ) -> Result<(), ProcessingError> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn process_event(&self, _event: &mut EventStore) -> Result<(), ProcessingError> {
        let count = self.events.fetch_add(1, Ordering::Relaxed);
        if count % self.how_often == 0 {
            info!(
                target: "runtime.processor",
                runs = self.runs.load(Ordering::Relaxed),
                event = count,
                "status"
            );
        }
        Ok(())
    }

    fn end(&self) -> Result<(), ProcessingError> {
        info!(
            target: "runtime.processor",
            name = self.name(),
            events = self.events.load(Ordering::Relaxed),
            runs = self.runs.load(Ordering::Relaxed),
            "status_monitor_summary"
        );
        Ok(())
    }

    // Counting through atomics is thread safe and holds no bulk state:
    // share one instance, no lock.
    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("StatusMonitor", StatusMonitor);
