//! TOML steering-file loading.
//!
//! The steering file is plain TOML; tables become sections, nested tables
//! become subsections, and every leaf value is carried as a string (arrays as
//! string lists). A `[constants]` section provides `${name}` substitution
//! into every other value at load time.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::configuration::{ConfigSection, ConfigValue, Configuration};
use crate::ConfigError;

/// Load and substitute a steering file from disk.
pub fn load_steering(path: &Path) -> Result<Configuration, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_steering(&content)?;
    info!(
        target: "config",
        file = %path.display(),
        sections = config.section_names().count(),
        "steering_loaded"
    );
    Ok(config)
}

/// Parse steering content. Top-level values must live inside a section.
pub fn parse_steering(content: &str) -> Result<Configuration, ConfigError> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::Steering(e.to_string()))?;
    let mut config = Configuration::new();
    for (key, value) in table {
        match value {
            toml::Value::Table(inner) => {
                config.insert_section(section_from_table(&key, inner)?);
            }
            _ => {
                return Err(ConfigError::Steering(format!(
                    "top-level value '{key}' must live inside a section"
                )));
            }
        }
    }
    let constants = collect_constants(&config)?;
    if !constants.is_empty() {
        substitute_configuration(&mut config, &constants)?;
    }
    Ok(config)
}

fn section_from_table(name: &str, table: toml::Table) -> Result<ConfigSection, ConfigError> {
    let mut section = ConfigSection::new(name);
    for (key, value) in table {
        match value {
            toml::Value::Table(inner) => {
                section.insert_section(section_from_table(&key, inner)?);
            }
            toml::Value::Array(items) => {
                let rendered = items
                    .iter()
                    .map(|item| value_to_string(name, &key, item))
                    .collect::<Result<Vec<_>, _>>()?;
                section.set(&key, ConfigValue::List(rendered));
            }
            other => {
                section.set(&key, ConfigValue::Scalar(value_to_string(name, &key, &other)?));
            }
        }
    }
    Ok(section)
}

fn value_to_string(section: &str, key: &str, value: &toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(ConfigError::Steering(format!(
            "[{section}] {key}: nested arrays and tables are not supported as values"
        ))),
    }
}

fn collect_constants(config: &Configuration) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut constants = BTreeMap::new();
    if let Some(section) = config.section("constants") {
        for (key, value) in section.values() {
            match value {
                ConfigValue::Scalar(s) => {
                    constants.insert(key.clone(), s.clone());
                }
                ConfigValue::List(_) => {
                    return Err(ConfigError::Steering(format!(
                        "[constants] {key}: constants must be scalars"
                    )));
                }
            }
        }
    }
    Ok(constants)
}

fn substitute_configuration(
    config: &mut Configuration,
    constants: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for section in config.sections_mut() {
        if section.name() == "constants" {
            continue;
        }
        substitute_section(section, constants)?;
    }
    Ok(())
}

fn substitute_section(
    section: &mut ConfigSection,
    constants: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for value in section.values_mut() {
        match value {
            ConfigValue::Scalar(s) => *s = substitute(s, constants)?,
            ConfigValue::List(items) => {
                for item in items {
                    *item = substitute(item, constants)?;
                }
            }
        }
    }
    for sub in section.sections_mut() {
        substitute_section(sub, constants)?;
    }
    Ok(())
}

/// Replace every `${name}` occurrence. Substitution is single-pass; constants
/// do not reference other constants.
fn substitute(input: &str, constants: &BTreeMap<String, String>) -> Result<String, ConfigError> {
    if !input.contains("${") {
        return Ok(input.to_string());
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::Steering(format!(
                "unterminated constant reference in '{input}'"
            )));
        };
        let name = &after[..end];
        let Some(value) = constants.get(name) else {
            return Err(ConfigError::UnknownConstant(name.to_string()));
        };
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// A commented default steering file, emitted by `--dump-example`.
pub fn dump_example() -> String {
    EXAMPLE_STEERING.to_string()
}

const EXAMPLE_STEERING: &str = r#"# Example eventide steering file.
#
# Sections bind onto component parameters; unknown keys are ignored so files
# stay forward compatible. Values from [constants] substitute into ${name}
# references everywhere else.

[constants]
OutputBase = "eventide-example"

[global]
# Seed for the per-event, per-processor random seed derivation.
RandomSeed = 1234567890

[logging]
# trace | debug | info | warn | error
Level = "info"
# Empty logs to stderr; a file name enables the non-blocking file writer.
Logfile = ""
ColoredConsole = false

[scheduler]
# Simple | WorkerPool
type = "WorkerPool"
nthreads = 4

[datasource]
type = "SyntheticSource"
RunNumbers = [1]
EventsPerRun = 100
DetectorName = "ExampleDetector"

[bookstore]
OutputFile = "${OutputBase}.toml"
# Single | MultiShared | MultiCopy
DefaultMemoryLayout = "MultiShared"
StoreByDefault = true

[execute]
processors = ["Status", "Counter"]

[processors.Status]
type = "StatusMonitor"
HowOften = 10

[processors.Counter]
type = "EventCounter"
"#;
