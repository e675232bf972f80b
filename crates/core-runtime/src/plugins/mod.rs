//! Built-in plugins shipped with the runtime.
//!
//! Registered at compile time through the declaration macros; the plugin
//! manager picks them up alongside anything loaded from dynamic libraries.

pub mod cpu_crunch;
pub mod event_counter;
pub mod event_selector;
pub mod status_monitor;
pub mod synthetic_source;

pub use cpu_crunch::CpuCrunch;
pub use event_counter::EventCounter;
pub use event_selector::EventSelector;
pub use status_monitor::StatusMonitor;
pub use synthetic_source::{SyntheticEvent, SyntheticSource};
