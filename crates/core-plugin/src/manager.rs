//! Process-wide plugin registry.
//!
//! Factories arrive two ways: compile-time declarations collected through
//! `inventory` (the [`declare_processor!`] family of macros) and dynamic
//! libraries loaded at startup, each exposing an
//! `eventide_register_plugins(*mut PluginRegistrar)` entry point.
//! Registration is idempotent for an identical factory and fatal for a
//! distinct one under the same name, before any scheduling starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::processor::Processor;
use crate::scheduler::Scheduler;
use crate::source::DataSource;
use crate::PluginError;

/// The pluggable component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginKind {
    Processor,
    DataSource,
    Scheduler,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PluginKind::Processor => "processor",
            PluginKind::DataSource => "data source",
            PluginKind::Scheduler => "scheduler",
        })
    }
}

/// A typed factory producing a freshly owned component.
#[derive(Clone, Copy)]
pub enum PluginFactory {
    Processor(fn() -> Box<dyn Processor>),
    DataSource(fn() -> Box<dyn DataSource>),
    Scheduler(fn() -> Box<dyn Scheduler>),
}

impl PluginFactory {
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginFactory::Processor(_) => PluginKind::Processor,
            PluginFactory::DataSource(_) => PluginKind::DataSource,
            PluginFactory::Scheduler(_) => PluginKind::Scheduler,
        }
    }

    /// Address identity, used to make re-registration idempotent.
    fn addr(&self) -> usize {
        match self {
            PluginFactory::Processor(f) => *f as usize,
            PluginFactory::DataSource(f) => *f as usize,
            PluginFactory::Scheduler(f) => *f as usize,
        }
    }
}

/// One compile-time registration, collected across all linked crates.
pub struct PluginRegistration {
    pub name: &'static str,
    pub factory: PluginFactory,
}

inventory::collect!(PluginRegistration);

/// Registration surface handed to dynamically loaded libraries.
pub struct PluginRegistrar<'a> {
    manager: &'a mut PluginManager,
}

impl PluginRegistrar<'_> {
    pub fn register(&mut self, name: &str, factory: PluginFactory) -> Result<(), PluginError> {
        self.manager.register(name, factory)
    }
}

/// Signature of the entry point a plugin library exposes.
pub type RegisterPluginsFn = unsafe extern "C" fn(*mut PluginRegistrar<'_>);

/// Registry mapping `(kind, name)` to factories, plus the set of opened
/// plugin libraries.
pub struct PluginManager {
    factories: BTreeMap<(PluginKind, String), PluginFactory>,
    libraries: Vec<(PathBuf, libloading::Library)>,
}

impl PluginManager {
    /// Build the registry, seeded with every compile-time declaration.
    pub fn new() -> Result<Self, PluginError> {
        let mut manager = Self {
            factories: BTreeMap::new(),
            libraries: Vec::new(),
        };
        for registration in inventory::iter::<PluginRegistration> {
            manager.register(registration.name, registration.factory)?;
        }
        Ok(manager)
    }

    /// Register a factory. Idempotent for the identical factory pointer;
    /// a distinct factory under the same name fails.
    pub fn register(&mut self, name: &str, factory: PluginFactory) -> Result<(), PluginError> {
        let kind = factory.kind();
        let key = (kind, name.to_string());
        if let Some(existing) = self.factories.get(&key) {
            if existing.addr() == factory.addr() {
                return Ok(());
            }
            return Err(PluginError::DuplicateFactory {
                kind,
                name: name.to_string(),
            });
        }
        debug!(target: "runtime.plugins", %kind, name, "factory_registered");
        self.factories.insert(key, factory);
        Ok(())
    }

    pub fn create_processor(&self, name: &str) -> Result<Box<dyn Processor>, PluginError> {
        match self.factories.get(&(PluginKind::Processor, name.to_string())) {
            Some(PluginFactory::Processor(factory)) => Ok(factory()),
            _ => Err(PluginError::Unknown {
                kind: PluginKind::Processor,
                name: name.to_string(),
            }),
        }
    }

    pub fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>, PluginError> {
        match self.factories.get(&(PluginKind::DataSource, name.to_string())) {
            Some(PluginFactory::DataSource(factory)) => Ok(factory()),
            _ => Err(PluginError::Unknown {
                kind: PluginKind::DataSource,
                name: name.to_string(),
            }),
        }
    }

    pub fn create_scheduler(&self, name: &str) -> Result<Box<dyn Scheduler>, PluginError> {
        match self.factories.get(&(PluginKind::Scheduler, name.to_string())) {
            Some(PluginFactory::Scheduler(factory)) => Ok(factory()),
            _ => Err(PluginError::Unknown {
                kind: PluginKind::Scheduler,
                name: name.to_string(),
            }),
        }
    }

    /// Registered names of one kind, sorted.
    pub fn names(&self, kind: PluginKind) -> Vec<&str> {
        self.factories
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Load each library, ignoring paths already loaded, and run its
    /// registration entry point.
    pub fn load_libraries(&mut self, paths: &[PathBuf]) -> Result<(), PluginError> {
        for path in paths {
            if self.libraries.iter().any(|(loaded, _)| loaded == path) {
                debug!(target: "runtime.plugins", file = %path.display(), "library_already_loaded");
                continue;
            }
            self.load_library(path)?;
        }
        Ok(())
    }

    fn load_library(&mut self, path: &Path) -> Result<(), PluginError> {
        let library_error = |e: libloading::Error| PluginError::Library {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        // SAFETY: loading a plugin library runs its initializers; the
        // library is trusted by virtue of being listed in the plugin path.
        let library = unsafe { libloading::Library::new(path) }.map_err(library_error)?;
        {
            let register: libloading::Symbol<'_, RegisterPluginsFn> =
                unsafe { library.get(b"eventide_register_plugins") }.map_err(library_error)?;
            let mut registrar = PluginRegistrar { manager: self };
            // SAFETY: the entry point contract passes a valid registrar for
            // the duration of the call.
            unsafe { register(&raw mut registrar) };
        }
        info!(target: "runtime.plugins", file = %path.display(), "library_loaded");
        self.libraries.push((path.to_path_buf(), library));
        Ok(())
    }

    /// Human-readable registry listing for diagnostics.
    pub fn dump(&self) -> String {
        let mut out = String::from("Registered plugins:\n");
        for kind in [
            PluginKind::Processor,
            PluginKind::DataSource,
            PluginKind::Scheduler,
        ] {
            out.push_str(&format!("  [{kind}]\n"));
            for name in self.names(kind) {
                out.push_str(&format!("    {name}\n"));
            }
        }
        out
    }
}

/// Split a colon-separated environment variable into library paths.
pub fn plugin_paths_from_env(variable: &str) -> Vec<PathBuf> {
    std::env::var(variable)
        .ok()
        .map(|raw| {
            raw.split(':')
                .filter(|part| !part.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Declare a compile-time processor factory under a plugin name.
#[macro_export]
macro_rules! declare_processor {
    ($name:literal, $ty:ty) => {
        $crate::inventory::submit! {
            $crate::PluginRegistration {
                name: $name,
                factory: $crate::PluginFactory::Processor(|| Box::new(<$ty>::new())),
            }
        }
    };
}

/// Declare a compile-time data-source factory under a plugin name.
#[macro_export]
macro_rules! declare_data_source {
    ($name:literal, $ty:ty) => {
        $crate::inventory::submit! {
            $crate::PluginRegistration {
                name: $name,
                factory: $crate::PluginFactory::DataSource(|| Box::new(<$ty>::new())),
            }
        }
    };
}

/// Declare a compile-time scheduler factory under a plugin name.
#[macro_export]
macro_rules! declare_scheduler {
    ($name:literal, $ty:ty) => {
        $crate::inventory::submit! {
            $crate::PluginRegistration {
                name: $name,
                factory: $crate::PluginFactory::Scheduler(|| Box::new(<$ty>::new())),
            }
        }
    };
}
