//! Synthetic event generation.
//!
//! Emits one run header per configured run number followed by that run's
//! events, with uids derived exactly like a real reader would derive them.
//! Stands in for on-disk format readers, which are plugins outside the core.

use core_events::{EventStore, RunHeader};
use core_plugin::{
    declare_data_source, Component, ComponentBase, DataSource, SourceCallbacks, SourceError,
};
use tracing::debug;

/// Payload of a synthetic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticEvent {
    pub event_number: i32,
    pub run_number: i32,
}

/// Deterministic in-memory data source.
pub struct SyntheticSource {
    base: ComponentBase,
    callbacks: SourceCallbacks,
    runs: Vec<i64>,
    events_per_run: i64,
    detector: String,
    run_cursor: usize,
    event_cursor: i64,
    header_pending: bool,
}

impl SyntheticSource {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("SyntheticSource");
        base.set_description("Generates synthetic run headers and events");
        let params = base.parameters_mut();
        params
            .register::<Vec<i64>>("RunNumbers", "Run numbers to emit, in order", Some(vec![1]))
            .expect("fresh parameter set");
        params
            .register::<i64>("EventsPerRun", "Events generated per run", Some(100))
            .expect("fresh parameter set");
        params
            .register::<String>(
                "DetectorName",
                "Detector name stamped on run headers",
                Some("Synthetic".to_string()),
            )
            .expect("fresh parameter set");
        params
            .set_validator::<i64, _>("EventsPerRun", |n| *n >= 0)
            .expect("parameter registered above");
        Self {
            base,
            callbacks: SourceCallbacks::default(),
            runs: vec![1],
            events_per_run: 100,
            detector: "Synthetic".to_string(),
            run_cursor: 0,
            event_cursor: 0,
            header_pending: true,
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SyntheticSource {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

impl DataSource for SyntheticSource {
    fn callbacks(&mut self) -> &mut SourceCallbacks {
        &mut self.callbacks
    }

    fn init(&mut self) -> Result<(), SourceError> {
        let params = self.base.parameters();
        self.runs = params.get::<Vec<i64>>("RunNumbers").unwrap_or_default();
        self.events_per_run = params.get::<i64>("EventsPerRun").unwrap_or(0);
        self.detector = params.get::<String>("DetectorName").unwrap_or_default();
        self.run_cursor = 0;
        self.event_cursor = 0;
        self.header_pending = true;
        debug!(
            target: "runtime.source",
            runs = self.runs.len(),
            events_per_run = self.events_per_run,
            "synthetic_source_ready"
        );
        Ok(())
    }

    fn read_one(&mut self) -> Result<bool, SourceError> {
        let Some(&run) = self.runs.get(self.run_cursor) else {
            return Ok(false);
        };
        let run = i32::try_from(run)
            .map_err(|_| SourceError::Format(format!("run number {run} out of range")))?;

        if self.header_pending {
            self.header_pending = false;
            let header = RunHeader::new(run)
                .set_detector_name(self.detector.clone())
                .set_description(format!("synthetic run {run}"));
            self.callbacks.forward_run_header(header)?;
            return Ok(true);
        }

        if self.event_cursor >= self.events_per_run {
            // Run exhausted; the next read starts the following run.
            self.run_cursor += 1;
            self.event_cursor = 0;
            self.header_pending = true;
            return self.read_one();
        }

        let event_number = self.event_cursor as i32;
        self.event_cursor += 1;
        let event = EventStore::new(
            event_number,
            run,
            SyntheticEvent {
                event_number,
                run_number: run,
            },
        );
        self.callbacks.forward_event(event)?;
        Ok(true)
    }
}

declare_data_source!("SyntheticSource", SyntheticSource);
