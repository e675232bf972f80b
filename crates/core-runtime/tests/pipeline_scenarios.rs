//! End-to-end pipeline behavior: counting, cloning, skip/stop, ordering,
//! seeds, and scheduler slot accounting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use core_book::{AxisConfig, BookStore, Handle, H1I};
use core_config::parse_steering;
use core_events::{EventStore, RandomSeedManager};
use core_plugin::{
    api, declare_processor, Component, ComponentBase, DataSource, InitContext, PluginManager,
    ProcessingError, Processor, RuntimeOption, Scheduler, SchedulerContext, SchedulerError,
    SourceError,
};
use core_runtime::plugins::{SyntheticEvent, SyntheticSource};
use core_runtime::{Application, FrameworkError, WorkerPoolScheduler};

macro_rules! impl_component {
    ($ty:ty) => {
        impl Component for $ty {
            fn base(&self) -> &ComponentBase {
                &self.base
            }
            fn base_mut(&mut self) -> &mut ComponentBase {
                &mut self.base
            }
        }
    };
}

fn steering(body: &str) -> core_config::Configuration {
    parse_steering(body).expect("test steering parses")
}

fn event_number(event: &EventStore) -> i32 {
    event
        .event::<SyntheticEvent>()
        .expect("synthetic payload")
        .event_number
}

// ---------------------------------------------------------------------------
// Scenario: single-processor round trip over a MultiCopy histogram.
// ---------------------------------------------------------------------------

static UID_MERGED: Mutex<Option<H1I>> = Mutex::new(None);

struct UidCounter {
    base: ComponentBase,
    handle: Option<Handle<H1I>>,
}

impl UidCounter {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("UidCounter"),
            handle: None,
        }
    }
}

impl_component!(UidCounter);

impl Processor for UidCounter {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        let handle = ctx.book.book_multi_copy("/counter/", "mod10", || {
            H1I::new("event number mod 10", [AxisConfig::new("n", 10, 0.0, 10.0)])
        })?;
        self.handle = Some(handle);
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError> {
        let n = event_number(event);
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| ProcessingError::fatal("not initialized"))?;
        handle.fill([f64::from(n % 10)], 1);
        Ok(())
    }

    fn end(&self) -> Result<(), ProcessingError> {
        if let Some(handle) = &self.handle {
            *UID_MERGED.lock().unwrap() = Some(handle.merged());
        }
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        // One instance books once; the handle is safe across workers.
        Some(false)
    }
}

declare_processor!("TestUidCounter", UidCounter);

#[test]
fn round_trip_multi_copy_histogram() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("counter.toml");
    let config = steering(&format!(
        r#"
[scheduler]
type = "WorkerPool"
nthreads = 4

[datasource]
type = "SyntheticSource"
RunNumbers = [0]
EventsPerRun = 1000

[bookstore]
OutputFile = "{}"

[execute]
processors = ["Counter"]

[processors.Counter]
type = "TestUidCounter"
"#,
        artifact.display()
    ));

    let summary = Application::new(config).run().unwrap();
    assert_eq!(summary.events_pushed, 1000);
    assert_eq!(summary.events_finished, 1000, "every pushed event pops");
    assert_eq!(summary.run_headers, 1);
    assert!(!summary.stopped);

    let merged = UID_MERGED.lock().unwrap().take().expect("end ran");
    assert_eq!(merged.integral(), 1000, "merged histogram sums to 1000");
    for k in 0..10 {
        assert_eq!(merged.bin_content([k]), 100, "bin {k}");
    }

    let written = std::fs::read_to_string(&artifact).unwrap();
    assert!(written.contains("/counter/mod10"), "artifact written");
}

// ---------------------------------------------------------------------------
// Scenario: clone vs shared instances.
// ---------------------------------------------------------------------------

static CLONE_INSTANCES: AtomicUsize = AtomicUsize::new(0);
static SHARED_INSTANCES: AtomicUsize = AtomicUsize::new(0);
static SHARED_EVENTS: AtomicUsize = AtomicUsize::new(0);
static SHARED_IN_FLIGHT: AtomicBool = AtomicBool::new(false);
static SHARED_OVERLAPS: AtomicUsize = AtomicUsize::new(0);

struct CloneProbe {
    base: ComponentBase,
}

impl CloneProbe {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("CloneProbe"),
        }
    }
}

impl_component!(CloneProbe);

impl Processor for CloneProbe {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        CLONE_INSTANCES.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn process_event(&self, _event: &mut EventStore) -> Result<(), ProcessingError> {
        Ok(())
    }
    // Defaults: Clone = true, one instance per worker.
}

declare_processor!("TestCloneProbe", CloneProbe);

struct SharedProbe {
    base: ComponentBase,
}

impl SharedProbe {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("SharedProbe"),
        }
    }
}

impl_component!(SharedProbe);

impl Processor for SharedProbe {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        SHARED_INSTANCES.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn process_event(&self, _event: &mut EventStore) -> Result<(), ProcessingError> {
        if SHARED_IN_FLIGHT.swap(true, Ordering::SeqCst) {
            SHARED_OVERLAPS.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_micros(50));
        SHARED_EVENTS.fetch_add(1, Ordering::SeqCst);
        SHARED_IN_FLIGHT.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn runtime_option(&self, option: RuntimeOption) -> Option<bool> {
        match option {
            RuntimeOption::Clone => Some(false),
            RuntimeOption::Critical => Some(true),
        }
    }
}

declare_processor!("TestSharedProbe", SharedProbe);

#[test]
fn clone_and_shared_materialization() {
    let config = steering(
        r#"
[scheduler]
type = "WorkerPool"
nthreads = 4

[datasource]
type = "SyntheticSource"
RunNumbers = [1]
EventsPerRun = 200

[bookstore]
OutputFile = ""

[execute]
processors = ["First", "Second"]

[processors.First]
type = "TestCloneProbe"

[processors.Second]
type = "TestSharedProbe"
"#,
    );

    let summary = Application::new(config).run().unwrap();
    assert_eq!(summary.events_finished, 200);
    assert_eq!(
        CLONE_INSTANCES.load(Ordering::SeqCst),
        4,
        "one clone per worker"
    );
    assert_eq!(
        SHARED_INSTANCES.load(Ordering::SeqCst),
        1,
        "one shared instance"
    );
    assert_eq!(SHARED_EVENTS.load(Ordering::SeqCst), 200);
    assert_eq!(
        SHARED_OVERLAPS.load(Ordering::SeqCst),
        0,
        "critical section must serialize the shared instance"
    );
}

// ---------------------------------------------------------------------------
// Scenario: skip every third event.
// ---------------------------------------------------------------------------

static SKIP_SEEN: AtomicUsize = AtomicUsize::new(0);
static SKIP_B_COUNT: AtomicUsize = AtomicUsize::new(0);

struct SkipperA {
    base: ComponentBase,
}

impl SkipperA {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("SkipperA"),
        }
    }
}

impl_component!(SkipperA);

impl Processor for SkipperA {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError> {
        let n = SKIP_SEEN.fetch_add(1, Ordering::SeqCst);
        if n % 3 == 0 {
            api::set_return_value(self, event, false);
            return Err(api::skip_event(self));
        }
        api::set_return_value(self, event, true);
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("TestSkipperA", SkipperA);

struct CounterB {
    base: ComponentBase,
}

impl CounterB {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("CounterB"),
        }
    }
}

impl_component!(CounterB);

impl Processor for CounterB {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_event(&self, _event: &mut EventStore) -> Result<(), ProcessingError> {
        SKIP_B_COUNT.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("TestCounterB", CounterB);

#[test]
fn skip_aborts_remaining_processors() {
    let config = steering(
        r#"
[scheduler]
type = "WorkerPool"
nthreads = 4

[datasource]
type = "SyntheticSource"
RunNumbers = [1]
EventsPerRun = 30

[bookstore]
OutputFile = ""

[execute]
processors = ["A", "B"]

[processors.A]
type = "TestSkipperA"

[processors.B]
type = "TestCounterB"
"#,
    );

    let summary = Application::new(config).run().unwrap();
    assert_eq!(summary.events_pushed, 30);
    assert_eq!(summary.events_finished, 30, "skipped events still complete");
    assert_eq!(SKIP_SEEN.load(Ordering::SeqCst), 30);
    assert_eq!(
        SKIP_B_COUNT.load(Ordering::SeqCst),
        20,
        "every third event never reaches B"
    );
}

// ---------------------------------------------------------------------------
// Scenario: stop drains in-flight events and terminates cleanly.
// ---------------------------------------------------------------------------

static STOP_SEEN: AtomicUsize = AtomicUsize::new(0);
static STOP_B_COUNT: AtomicUsize = AtomicUsize::new(0);

struct StopperA {
    base: ComponentBase,
}

impl StopperA {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("StopperA"),
        }
    }
}

impl_component!(StopperA);

impl Processor for StopperA {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_event(&self, _event: &mut EventStore) -> Result<(), ProcessingError> {
        let n = STOP_SEEN.fetch_add(1, Ordering::SeqCst);
        if n == 24 {
            return Err(ProcessingError::StopProcessing);
        }
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("TestStopperA", StopperA);

struct StopB {
    base: ComponentBase,
}

impl StopB {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("StopB"),
        }
    }
}

impl_component!(StopB);

impl Processor for StopB {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_event(&self, _event: &mut EventStore) -> Result<(), ProcessingError> {
        STOP_B_COUNT.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("TestStopB", StopB);

#[test]
fn stop_request_drains_and_terminates() {
    let config = steering(
        r#"
[scheduler]
type = "WorkerPool"
nthreads = 2

[datasource]
type = "SyntheticSource"
RunNumbers = [1]
EventsPerRun = 30

[bookstore]
OutputFile = ""

[execute]
processors = ["A", "B"]

[processors.A]
type = "TestStopperA"

[processors.B]
type = "TestStopB"
"#,
    );

    let summary = Application::new(config).run().unwrap();
    assert!(summary.stopped, "stop must be reported");
    assert_eq!(
        summary.events_pushed, summary.events_finished,
        "no event may leak"
    );
    let pushed = summary.events_pushed as usize;
    assert!(pushed >= 25, "at least the stop-raising event was pushed");
    assert!(pushed <= 30);
    // Every drained event passed B except the one that raised the stop.
    assert_eq!(STOP_B_COUNT.load(Ordering::SeqCst), pushed - 1);
}

// ---------------------------------------------------------------------------
// Scenario: seed determinism across runs.
// ---------------------------------------------------------------------------

static SEED_RUNS: Mutex<Vec<HashMap<u32, u32>>> = Mutex::new(Vec::new());

struct SeedProbe {
    base: ComponentBase,
}

impl SeedProbe {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("SeedProbe"),
        }
    }
}

impl_component!(SeedProbe);

impl Processor for SeedProbe {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        api::register_for_random_seeds(self, ctx);
        SEED_RUNS.lock().unwrap().push(HashMap::new());
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError> {
        let seed = api::random_seed(self, event)?;
        let mut runs = SEED_RUNS.lock().unwrap();
        let current = runs.last_mut().expect("init pushed a map");
        current.insert(event.uid(), seed);
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("TestSeedProbe", SeedProbe);

#[test]
fn seeds_are_deterministic_across_runs() {
    let body = r#"
[global]
RandomSeed = 987654321

[scheduler]
type = "WorkerPool"
nthreads = 3

[datasource]
type = "SyntheticSource"
RunNumbers = [7]
EventsPerRun = 50

[bookstore]
OutputFile = ""

[execute]
processors = ["Seeds"]

[processors.Seeds]
type = "TestSeedProbe"
"#;

    Application::new(steering(body)).run().unwrap();
    Application::new(steering(body)).run().unwrap();

    let runs = SEED_RUNS.lock().unwrap();
    assert!(runs.len() >= 2);
    let (first, second) = (&runs[runs.len() - 2], &runs[runs.len() - 1]);
    assert_eq!(first.len(), 50);
    assert_eq!(first, second, "same (event, run) pairs, same seeds");
}

// ---------------------------------------------------------------------------
// Scenario: run headers are ordered before their events.
// ---------------------------------------------------------------------------

static LAST_HEADER_RUN: AtomicI32 = AtomicI32::new(-1);
static HEADER_VIOLATIONS: AtomicUsize = AtomicUsize::new(0);
static HEADERS_SEEN: AtomicUsize = AtomicUsize::new(0);

struct HeaderProbe {
    base: ComponentBase,
}

impl HeaderProbe {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("HeaderProbe"),
        }
    }
}

impl_component!(HeaderProbe);

impl Processor for HeaderProbe {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_run_header(
        &self,
        header: &core_events::RunHeader,
    ) -> Result<(), ProcessingError> {
        HEADERS_SEEN.fetch_add(1, Ordering::SeqCst);
        LAST_HEADER_RUN.store(header.run_number(), Ordering::SeqCst);
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError> {
        let run = event
            .event::<SyntheticEvent>()
            .map(|record| record.run_number)
            .unwrap_or(-1);
        if LAST_HEADER_RUN.load(Ordering::SeqCst) != run {
            HEADER_VIOLATIONS.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("TestHeaderProbe", HeaderProbe);

#[test]
fn run_headers_precede_their_events() {
    let config = steering(
        r#"
[scheduler]
type = "WorkerPool"
nthreads = 4

[datasource]
type = "SyntheticSource"
RunNumbers = [1, 2, 3]
EventsPerRun = 40

[bookstore]
OutputFile = ""

[execute]
processors = ["Headers"]

[processors.Headers]
type = "TestHeaderProbe"
"#,
    );

    let summary = Application::new(config).run().unwrap();
    assert_eq!(summary.run_headers, 3);
    assert_eq!(summary.events_finished, 120);
    assert_eq!(HEADERS_SEEN.load(Ordering::SeqCst), 3);
    assert_eq!(
        HEADER_VIOLATIONS.load(Ordering::SeqCst),
        0,
        "a header issued before an event is seen by that event's worker first"
    );
}

// ---------------------------------------------------------------------------
// Scheduler slot accounting and teardown, driven directly.
// ---------------------------------------------------------------------------

static END_CALLS: AtomicUsize = AtomicUsize::new(0);

struct Blocker {
    base: ComponentBase,
}

impl Blocker {
    fn new() -> Self {
        Self {
            base: ComponentBase::new("Blocker"),
        }
    }
}

impl_component!(Blocker);

impl Processor for Blocker {
    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process_event(&self, _event: &mut EventStore) -> Result<(), ProcessingError> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(())
    }

    fn end(&self) -> Result<(), ProcessingError> {
        END_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn runtime_option(&self, _option: RuntimeOption) -> Option<bool> {
        Some(false)
    }
}

declare_processor!("TestBlocker", Blocker);

fn synthetic(event_number: i32, run_number: i32) -> EventStore {
    EventStore::new(
        event_number,
        run_number,
        SyntheticEvent {
            event_number,
            run_number,
        },
    )
}

#[test]
fn free_slots_track_active_events() {
    let config = steering(
        r#"
[execute]
processors = ["Block"]

[processors.Block]
type = "TestBlocker"
"#,
    );
    let plugins = PluginManager::new().unwrap();
    let mut book = BookStore::new(4);
    let mut seeds = RandomSeedManager::new(1);
    let mut scheduler = WorkerPoolScheduler::new();
    scheduler
        .initialize(&mut SchedulerContext {
            workers: 4,
            config: &config,
            plugins: &plugins,
            book: &mut book,
            seeds: &mut seeds,
        })
        .unwrap();

    assert_eq!(scheduler.free_slots(), 4, "all slots free when idle");
    for i in 0..4 {
        scheduler.push_event(synthetic(i, 0)).unwrap();
    }
    // Workers sleep well past the push burst: all slots occupied.
    assert_eq!(scheduler.free_slots(), 0);
    assert!(!scheduler.stop_requested());

    scheduler.end().unwrap();
    let mut finished = Vec::new();
    scheduler.pop_finished_events(&mut finished);
    assert_eq!(finished.len(), 4, "each pushed event pops exactly once");
    let mut uids: Vec<u32> = finished.iter().map(EventStore::uid).collect();
    uids.sort_unstable();
    uids.dedup();
    assert_eq!(uids.len(), 4, "no duplicates");
    assert_eq!(scheduler.free_slots(), 4);

    // Teardown is guarded per instance: a second end is a no-op.
    scheduler.end().unwrap();
    assert_eq!(END_CALLS.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Configuration boundary behavior.
// ---------------------------------------------------------------------------

#[test]
fn empty_execute_list_is_a_configuration_error() {
    let config = steering(
        r#"
[datasource]
type = "SyntheticSource"

[bookstore]
OutputFile = ""
"#,
    );
    let err = Application::new(config).run().unwrap_err();
    assert!(matches!(
        &err,
        FrameworkError::Scheduler(SchedulerError::EmptyExecuteList)
    ));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn odd_event_list_fails_at_init() {
    let config = steering(
        r#"
[datasource]
type = "SyntheticSource"
EventsPerRun = 5

[bookstore]
OutputFile = ""

[execute]
processors = ["Select"]

[processors.Select]
type = "EventSelector"
EventList = [1, 0, 2]
"#,
    );
    let err = Application::new(config).run().unwrap_err();
    assert!(matches!(
        err,
        FrameworkError::Scheduler(SchedulerError::Processor { phase: "init", .. })
    ));
}

#[test]
fn simple_scheduler_round_trip() {
    let config = steering(
        r#"
[scheduler]
type = "Simple"

[datasource]
type = "SyntheticSource"
RunNumbers = [1]
EventsPerRun = 100

[bookstore]
OutputFile = ""

[execute]
processors = ["Status"]

[processors.Status]
type = "StatusMonitor"
HowOften = 50
"#,
    );
    let summary = Application::new(config).run().unwrap();
    assert_eq!(summary.events_finished, 100);
    assert!(!summary.stopped);
}

#[test]
fn forwarding_without_callbacks_is_fatal() {
    let mut source = SyntheticSource::new();
    source.init().unwrap();
    assert!(matches!(
        source.read_one(),
        Err(SourceError::MissingCallback("onRunHeaderRead"))
    ));
}
