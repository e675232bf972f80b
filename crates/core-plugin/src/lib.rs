//! The component and plugin model.
//!
//! Everything configurable in the framework is a [`Component`]: it owns an
//! instance name, a type, a description, and a bound parameter set. The
//! pluggable component kinds ([`Processor`], [`DataSource`], [`Scheduler`])
//! are traits over `Component`; their factories register with the
//! process-wide [`PluginManager`], either at compile time through the
//! declaration macros or at startup from dynamic libraries.

use thiserror::Error;

pub mod api;
pub mod component;
pub mod manager;
pub mod processor;
pub mod scheduler;
pub mod source;

pub use component::{Component, ComponentBase};
pub use manager::{
    plugin_paths_from_env, PluginFactory, PluginKind, PluginManager, PluginRegistrar,
    PluginRegistration,
};
pub use processor::{InitContext, Processor, RuntimeOption};
pub use scheduler::{Scheduler, SchedulerContext};
pub use source::{DataSource, SourceCallbacks};

// Re-exported for the declaration macros.
pub use inventory;

use core_book::BookError;
use core_config::ConfigError;

/// Control-flow and failure signals raised by processor hooks.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Abort the remaining processors for this event; the event completes
    /// successfully.
    #[error("event skipped")]
    SkipEvent,

    /// Drain in-flight events and terminate cleanly.
    #[error("stop of event processing requested")]
    StopProcessing,

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("book store: {0}")]
    Book(#[from] BookError),

    /// Anything else: fatal, propagated after teardown ran.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl ProcessingError {
    pub fn fatal(message: impl Into<String>) -> Self {
        ProcessingError::Fatal(anyhow::anyhow!(message.into()))
    }
}

/// Errors raised by data sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A record could not be decoded. Logged; the source marks itself
    /// exhausted.
    #[error("malformed record: {0}")]
    Format(String),

    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Clean-shutdown signal used to unwind the read loop once the
    /// scheduler starts draining.
    #[error("stop of event processing requested")]
    Stop,

    /// Forwarding a record without a registered callback is a programming
    /// error and fatal.
    #[error("data source callback '{0}' not registered")]
    MissingCallback(&'static str),

    /// Failure forwarded from downstream of the read loop.
    #[error("{0}")]
    Fatal(String),
}

/// Errors raised by schedulers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("active processor list is empty")]
    EmptyExecuteList,

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("plugin: {0}")]
    Plugin(#[from] PluginError),

    #[error("book store: {0}")]
    Book(#[from] BookError),

    #[error("processor '{name}' failed during {phase}: {message}")]
    Processor {
        name: String,
        phase: &'static str,
        message: String,
    },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Errors raised by the plugin manager.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("no {kind} plugin named '{name}'")]
    Unknown { kind: PluginKind, name: String },

    /// Two distinct factories registered under the same kind and name.
    /// Re-registering the identical factory is idempotent.
    #[error("duplicate {kind} factory '{name}'")]
    DuplicateFactory { kind: PluginKind, name: String },

    #[error("failed to load plugin library {path}: {message}")]
    Library {
        path: std::path::PathBuf,
        message: String,
    },
}
