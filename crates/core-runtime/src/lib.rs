//! The processing runtime: sequences, schedulers, managers, application.
//!
//! This crate turns the component contracts of `core-plugin` into a running
//! pipeline. Events flow `DataSource -> Application -> Scheduler ->
//! Sequence -> Processor`, with finished events drained back to the
//! application for release. The built-in plugins at the bottom of the crate
//! cover monitoring, selection, load generation and a synthetic data source.

use thiserror::Error;

pub mod application;
pub mod logger;
pub mod plugins;
pub mod scheduler_pool;
pub mod scheduler_simple;
pub mod sequence;
pub mod store_manager;

pub use application::{Application, RunSummary};
pub use logger::LoggerManager;
pub use scheduler_pool::WorkerPoolScheduler;
pub use scheduler_simple::SimpleScheduler;
pub use sequence::{EventOutcome, Sequence, SuperSequence};
pub use store_manager::BookStoreManager;

use core_book::BookError;
use core_config::ConfigError;
use core_plugin::{PluginError, SchedulerError, SourceError};

/// Environment variable listing plugin libraries, colon separated.
pub const PLUGIN_ENV: &str = "EVENTIDE_PLUGINS";

/// Top-level failure of an application run.
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("plugin: {0}")]
    Plugin(#[from] PluginError),

    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("data source: {0}")]
    Source(#[from] SourceError),

    #[error("book store: {0}")]
    Book(#[from] BookError),
}

impl FrameworkError {
    /// Process exit code: 1 for configuration problems caught before the
    /// first event, 2 for runtime failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            FrameworkError::Config(_) | FrameworkError::Plugin(_) => 1,
            FrameworkError::Scheduler(
                SchedulerError::EmptyExecuteList
                | SchedulerError::Config(_)
                | SchedulerError::Plugin(_),
            ) => 1,
            FrameworkError::Source(SourceError::Config(_)) => 1,
            _ => 2,
        }
    }
}
