//! Typed, self-describing configuration parameters and steering-file sections.
//!
//! Two layers live here:
//! - [`ParameterSet`]: the registry of typed, validated parameters a component
//!   declares at construction time. Parameters know their textual form so the
//!   steering dump and diagnostics can render them without knowing the type.
//! - [`Configuration`]: the section tree produced from a TOML steering file.
//!   Values are carried as strings (scalars or lists) and only acquire a type
//!   when bound onto a registered parameter.
//!
//! Binding is tolerant in one direction only: unknown section keys are
//! ignored (forward evolution of steering files), but a value that fails to
//! parse or is rejected by a validator is an error.

use std::path::PathBuf;

use thiserror::Error;

pub mod configuration;
pub mod parameter;
pub mod steering;
pub mod value;

pub use configuration::{ConfigSection, ConfigValue, Configuration};
pub use parameter::{ParameterImpl, ParameterSet};
pub use steering::{dump_example, load_steering, parse_steering};
pub use value::{ParamType, ParamValue};

/// Errors raised by parameter registration, binding, and steering loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter with this name is already registered on the component.
    #[error("parameter '{0}' already registered")]
    Registration(String),

    /// A validator rejected the value. The parameter keeps its previous state.
    #[error("parameter '{name}' rejected value '{value}'")]
    Validation { name: String, value: String },

    /// A steering value could not be parsed into the parameter's type.
    #[error("parameter '{name}': {message}")]
    Parse { name: String, message: String },

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("missing configuration section '{0}'")]
    MissingSection(String),

    /// A `${name}` reference with no matching entry in `[constants]`.
    #[error("unknown constant '${{{0}}}'")]
    UnknownConstant(String),

    #[error("failed to read steering file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("steering file error: {0}")]
    Steering(String),

    #[error("malformed override '{0}' (expected section.param=value)")]
    Override(String),
}
