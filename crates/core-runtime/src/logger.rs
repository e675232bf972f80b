//! Global logging configuration.
//!
//! Installs the `tracing` subscriber once per process from the `[logging]`
//! section: `Level` seeds the filter when `RUST_LOG` is absent, `Logfile`
//! switches output from stderr to a non-blocking file writer, and a panic
//! hook records panics before the default hook runs.

use std::sync::Once;

use core_config::{ConfigError, Configuration};
use core_plugin::{Component, ComponentBase};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub struct LoggerManager {
    base: ComponentBase,
    /// Keeps the non-blocking file writer alive for the process lifetime.
    guard: Option<WorkerGuard>,
}

impl LoggerManager {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("LoggerManager");
        base.set_description("Configures the global tracing subscriber");
        let params = base.parameters_mut();
        params
            .register::<String>(
                "Level",
                "Log level when RUST_LOG is unset: trace | debug | info | warn | error",
                Some("info".to_string()),
            )
            .expect("fresh parameter set");
        params
            .register::<String>(
                "Logfile",
                "Log file path; empty logs to stderr",
                Some(String::new()),
            )
            .expect("fresh parameter set");
        params
            .register::<bool>(
                "ColoredConsole",
                "Whether to use ANSI colors on console output",
                Some(false),
            )
            .expect("fresh parameter set");
        Self { base, guard: None }
    }

    pub fn initialize(&mut self, config: &Configuration) -> Result<(), ConfigError> {
        if let Some(section) = config.section("logging") {
            self.set_parameters(section)?;
        }
        let params = self.base.parameters();
        let level = params.get::<String>("Level").unwrap_or_default();
        let logfile = params.get::<String>("Logfile").unwrap_or_default();
        let colored = params.get::<bool>("ColoredConsole").unwrap_or(false);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.clone()));

        if logfile.is_empty() {
            // A subscriber may already be installed (tests, embedding):
            // keep the existing one in that case.
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(colored)
                .try_init();
        } else {
            let appender = tracing_appender::rolling::never(".", &logfile);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            match tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
            {
                Ok(()) => self.guard = Some(guard),
                Err(_) => {
                    // Already installed; drop the guard so the writer
                    // shuts down.
                }
            }
        }
        Self::install_panic_hook();
        info!(target: "runtime.logging", level = level.as_str(), file = logfile.as_str(), "logging_configured");
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

impl Default for LoggerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for LoggerManager {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}
