//! Event selection by explicit (event, run) list.

use std::collections::HashSet;

use core_events::EventStore;
use core_plugin::{
    api, declare_processor, Component, ComponentBase, InitContext, ProcessingError, Processor,
};
use tracing::debug;

use super::synthetic_source::SyntheticEvent;

/// Sets its return value to whether the event appears in `EventList`,
/// given as flat pairs of event number and run number. An empty list
/// accepts everything.
pub struct EventSelector {
    base: ComponentBase,
    selected: HashSet<(i64, i64)>,
    accept_all: bool,
}

impl EventSelector {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("EventSelector");
        base.set_description("Returns true iff the event was listed in EventList");
        base.parameters_mut()
            .register::<Vec<i64>>(
                "EventList",
                "Flat list of EventNumber RunNumber pairs",
                Some(Vec::new()),
            )
            .expect("fresh parameter set");
        Self {
            base,
            selected: HashSet::new(),
            accept_all: true,
        }
    }
}

impl Default for EventSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for EventSelector {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

impl Processor for EventSelector {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        let list = self
            .base
            .parameters()
            .get::<Vec<i64>>("EventList")
            .unwrap_or_default();
        if list.len() % 2 != 0 {
            return Err(ProcessingError::fatal(
                "EventList length must be even (pairs of EventNumber RunNumber)",
            ));
        }
        self.selected = list.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
        self.accept_all = self.selected.is_empty();
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError> {
        if self.accept_all {
            api::set_return_value(self, event, true);
            return Ok(());
        }
        let (event_number, run_number) = event
            .event::<SyntheticEvent>()
            .map(|record| (record.event_number, record.run_number))
            .ok_or_else(|| {
                ProcessingError::fatal("EventSelector expects synthetic event records")
            })?;
        let listed = self
            .selected
            .contains(&(i64::from(event_number), i64::from(run_number)));
        debug!(
            target: "runtime.processor",
            event = event_number,
            run = run_number,
            listed,
            "event_selection"
        );
        api::set_return_value(self, event, listed);
        Ok(())
    }
}

declare_processor!("EventSelector", EventSelector);
