//! Steering configuration sections.
//!
//! A [`Configuration`] is a tree of named sections holding string-typed
//! values. Recognized top-level sections: `global`, `execute`, `processors`,
//! `datasource`, `scheduler`, `logging`, `geometry`, `bookstore`,
//! `constants`. The tree itself does not interpret values; components bind
//! sections onto their [`ParameterSet`](crate::ParameterSet)s.

use std::collections::BTreeMap;

use crate::ConfigError;

/// A raw steering value: a single scalar or an ordered list, both as strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Scalar(String),
    List(Vec<String>),
}

impl ConfigValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        ConfigValue::Scalar(value.into())
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(s) => Some(s),
            ConfigValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::Scalar(_) => None,
            ConfigValue::List(items) => Some(items),
        }
    }
}

/// One named section: flat values plus nested subsections.
#[derive(Debug, Clone, Default)]
pub struct ConfigSection {
    name: String,
    values: BTreeMap<String, ConfigValue>,
    sections: BTreeMap<String, ConfigSection>,
}

impl ConfigSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
            sections: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_scalar(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ConfigValue::as_scalar)
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.values.iter()
    }

    pub fn section(&self, name: &str) -> Option<&ConfigSection> {
        self.sections.get(name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section_mut_or_default(&mut self, name: &str) -> &mut ConfigSection {
        self.sections
            .entry(name.to_string())
            .or_insert_with(|| ConfigSection::new(name))
    }

    pub fn insert_section(&mut self, section: ConfigSection) {
        self.sections.insert(section.name.clone(), section);
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut ConfigValue> {
        self.values.values_mut()
    }

    pub(crate) fn sections_mut(&mut self) -> impl Iterator<Item = &mut ConfigSection> {
        self.sections.values_mut()
    }
}

/// The full steering configuration: top-level sections by name.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    sections: BTreeMap<String, ConfigSection>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Option<&ConfigSection> {
        self.sections.get(name)
    }

    pub fn require_section(&self, name: &str) -> Result<&ConfigSection, ConfigError> {
        self.sections
            .get(name)
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn insert_section(&mut self, section: ConfigSection) {
        self.sections.insert(section.name().to_string(), section);
    }

    pub fn section_mut_or_default(&mut self, name: &str) -> &mut ConfigSection {
        self.sections
            .entry(name.to_string())
            .or_insert_with(|| ConfigSection::new(name))
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// The ordered list of active processor names from `[execute]`.
    pub fn active_processors(&self) -> Vec<String> {
        self.section("execute")
            .and_then(|s| s.get("processors"))
            .map(|v| match v {
                ConfigValue::Scalar(s) => s.split_whitespace().map(str::to_string).collect(),
                ConfigValue::List(items) => items.clone(),
            })
            .unwrap_or_default()
    }

    /// Apply a command-line override of the form
    /// `section[.subsection...].param=value`.
    pub fn apply_override(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (path, value) = spec
            .split_once('=')
            .ok_or_else(|| ConfigError::Override(spec.to_string()))?;
        let mut segments: Vec<&str> = path.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) || value.is_empty() {
            return Err(ConfigError::Override(spec.to_string()));
        }
        let param = segments.pop().expect("length checked above");
        let mut section = self.section_mut_or_default(segments[0]);
        for segment in &segments[1..] {
            section = section.section_mut_or_default(segment);
        }
        tracing::debug!(
            target: "config",
            path,
            value,
            "steering_override"
        );
        section.set(param, ConfigValue::scalar(value));
        Ok(())
    }

    pub(crate) fn sections_mut(&mut self) -> impl Iterator<Item = &mut ConfigSection> {
        self.sections.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_creates_nested_sections() {
        let mut config = Configuration::new();
        config
            .apply_override("processors.MyProc.HowOften=5")
            .unwrap();
        let value = config
            .section("processors")
            .and_then(|s| s.section("MyProc"))
            .and_then(|s| s.get_scalar("HowOften"));
        assert_eq!(value, Some("5"));
    }

    #[test]
    fn override_rejects_malformed_specs() {
        let mut config = Configuration::new();
        for bad in ["novalue", "onlyparam=1", "a..b=1", "a.b="] {
            assert!(
                matches!(config.apply_override(bad), Err(ConfigError::Override(_))),
                "expected rejection of '{bad}'"
            );
        }
    }

    #[test]
    fn active_processors_from_list() {
        let mut config = Configuration::new();
        let mut execute = ConfigSection::new("execute");
        execute.set(
            "processors",
            ConfigValue::List(vec!["A".into(), "B".into()]),
        );
        config.insert_section(execute);
        assert_eq!(config.active_processors(), vec!["A", "B"]);
    }

    #[test]
    fn active_processors_empty_without_section() {
        let config = Configuration::new();
        assert!(config.active_processors().is_empty());
    }
}
