//! Composition root.
//!
//! Owns every component, wires the data source callbacks into the
//! scheduler, and drives the lifecycle: plugins, logging, book store, seed
//! manager, scheduler, source, read loop, drain, teardown, write-out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use core_config::{ConfigError, Configuration};
use core_events::{IsFirstEvent, RandomSeedManager};
use core_plugin::{
    plugin_paths_from_env, PluginManager, Scheduler, SchedulerContext, SourceError,
};
use tracing::{info, warn};

use crate::logger::LoggerManager;
use crate::store_manager::BookStoreManager;
use crate::{FrameworkError, PLUGIN_ENV};

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Events handed to the scheduler.
    pub events_pushed: u64,
    /// Events surfaced back through `pop_finished_events`.
    pub events_finished: u64,
    /// Run headers broadcast.
    pub run_headers: u64,
    /// Whether a processor requested the stop (instead of end-of-stream).
    pub stopped: bool,
}

/// The application: owns components and drives the lifecycle.
pub struct Application {
    config: Configuration,
    nthreads_override: Option<usize>,
}

impl Application {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            nthreads_override: None,
        }
    }

    /// Override the steering worker count (the `--nthreads` surface).
    pub fn set_nthreads(&mut self, nthreads: usize) {
        self.nthreads_override = Some(nthreads);
    }

    fn resolve_workers(&self) -> Result<usize, ConfigError> {
        if let Some(n) = self.nthreads_override {
            return Ok(n.max(1));
        }
        match self
            .config
            .section("scheduler")
            .and_then(|s| s.get_scalar("nthreads"))
        {
            Some(raw) => raw.trim().parse::<usize>().map(|n| n.max(1)).map_err(|e| {
                ConfigError::Parse {
                    name: "scheduler.nthreads".to_string(),
                    message: e.to_string(),
                }
            }),
            None => Ok(1),
        }
    }

    /// Run the full lifecycle. Returns once the stream is exhausted or a
    /// processor stopped the run.
    pub fn run(&mut self) -> Result<RunSummary, FrameworkError> {
        let mut logger = LoggerManager::new();
        logger.initialize(&self.config)?;
        info!(target: "runtime", "startup");

        let mut plugins = PluginManager::new()?;
        plugins.load_libraries(&plugin_paths_from_env(PLUGIN_ENV))?;

        let workers = self.resolve_workers()?;
        let mut book_manager = BookStoreManager::new(workers);
        book_manager.initialize(&self.config)?;

        let global_seed = self
            .config
            .section("global")
            .and_then(|s| s.get_scalar("RandomSeed"))
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(RandomSeedManager::DEFAULT_GLOBAL_SEED);
        let mut seeds = RandomSeedManager::new(global_seed);

        // Scheduler: plugin selection plus parameter binding.
        let scheduler_type = self
            .config
            .section("scheduler")
            .and_then(|s| s.get_scalar("type"))
            .unwrap_or("WorkerPool")
            .to_string();
        let mut scheduler = plugins.create_scheduler(&scheduler_type)?;
        if let Some(section) = self.config.section("scheduler") {
            scheduler.set_parameters(section)?;
        }
        scheduler.initialize(&mut SchedulerContext {
            workers,
            config: &self.config,
            plugins: &plugins,
            book: book_manager.store_mut(),
            seeds: &mut seeds,
        })?;
        let scheduler: Arc<dyn Scheduler> = Arc::from(scheduler);

        // Data source.
        let source_section = self.config.require_section("datasource")?;
        let source_type = source_section
            .get_scalar("type")
            .ok_or_else(|| ConfigError::UnknownParameter("datasource.type".to_string()))?
            .to_string();
        let mut source = plugins.create_data_source(&source_type)?;
        source.set_parameters(source_section)?;
        source.init()?;

        info!(
            target: "runtime",
            workers,
            scheduler = scheduler_type.as_str(),
            source = source_type.as_str(),
            "pipeline_ready"
        );

        // Wire the callbacks. The producer thread pushes, drains finished
        // events opportunistically, and unwinds on a stop request.
        let pushed = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicU64::new(0));
        let headers = Arc::new(AtomicU64::new(0));
        let first_pushed = Arc::new(AtomicBool::new(false));

        {
            let scheduler = scheduler.clone();
            let pushed = pushed.clone();
            let finished = finished.clone();
            let first_pushed = first_pushed.clone();
            source.callbacks().on_event_read(Box::new(move |mut event| {
                if scheduler.stop_requested() {
                    return Err(SourceError::Stop);
                }
                if !first_pushed.swap(true, Ordering::AcqRel) {
                    event.extensions_mut().insert(IsFirstEvent(true));
                }
                scheduler
                    .push_event(event)
                    .map_err(|e| SourceError::Fatal(e.to_string()))?;
                pushed.fetch_add(1, Ordering::Relaxed);
                let mut done = Vec::new();
                scheduler.pop_finished_events(&mut done);
                finished.fetch_add(done.len() as u64, Ordering::Relaxed);
                Ok(())
            }));
        }
        {
            let scheduler = scheduler.clone();
            let headers = headers.clone();
            source
                .callbacks()
                .on_run_header_read(Box::new(move |header| {
                    if scheduler.stop_requested() {
                        return Err(SourceError::Stop);
                    }
                    scheduler
                        .process_run_header(header)
                        .map_err(|e| SourceError::Fatal(e.to_string()))?;
                    headers.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }));
        }

        // The read loop.
        let stopped = match source.read_all() {
            Ok(()) => {
                info!(target: "runtime", "end_of_stream");
                false
            }
            Err(SourceError::Stop) => {
                warn!(target: "runtime", "stop_requested_draining");
                true
            }
            Err(err) => return Err(err.into()),
        };

        // Drain in-flight events, tear the scheduler down, collect leftovers.
        scheduler.end()?;
        let mut done = Vec::new();
        scheduler.pop_finished_events(&mut done);
        finished.fetch_add(done.len() as u64, Ordering::Relaxed);
        drop(done);

        book_manager.write_to_disk()?;

        let summary = RunSummary {
            events_pushed: pushed.load(Ordering::Relaxed),
            events_finished: finished.load(Ordering::Relaxed),
            run_headers: headers.load(Ordering::Relaxed),
            stopped: stopped || scheduler.stop_requested(),
        };
        info!(
            target: "runtime",
            pushed = summary.events_pushed,
            finished = summary.events_finished,
            run_headers = summary.run_headers,
            stopped = summary.stopped,
            "shutdown_complete"
        );
        Ok(summary)
    }
}
