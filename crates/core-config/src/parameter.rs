//! Registered parameters and the per-component parameter set.
//!
//! A component registers its parameters once, at construction time, and the
//! set is later bound in bulk against the component's steering section.
//! Setting a value is all-or-nothing: a failing validator leaves the previous
//! state untouched.

use std::collections::BTreeMap;
use std::fmt;

use crate::configuration::{ConfigSection, ConfigValue};
use crate::value::{ParamType, ParamValue};
use crate::ConfigError;

type ValueValidator = Box<dyn Fn(&ParamValue) -> bool + Send + Sync>;

/// A single registered parameter: type, default, current value, validator.
pub struct ParameterImpl {
    name: String,
    description: String,
    type_str: &'static str,
    parse: fn(&str, &ConfigValue) -> Result<ParamValue, ConfigError>,
    default: Option<ParamValue>,
    value: Option<ParamValue>,
    validator: Option<ValueValidator>,
}

impl fmt::Debug for ParameterImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterImpl")
            .field("name", &self.name)
            .field("type", &self.type_str)
            .field("default", &self.default)
            .field("value", &self.value)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

impl ParameterImpl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn type_str(&self) -> &'static str {
        self.type_str
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Render the set value, or an empty string when unset.
    pub fn str(&self) -> String {
        self.value.as_ref().map(ParamValue::render).unwrap_or_default()
    }

    /// Render the default value, or an empty string when there is none.
    pub fn default_str(&self) -> String {
        self.default
            .as_ref()
            .map(ParamValue::render)
            .unwrap_or_default()
    }

    /// Forget the explicitly set value, falling back to the default.
    pub fn reset(&mut self) {
        self.value = None;
    }

    /// The effective value: set value, else default.
    pub fn effective(&self) -> Option<&ParamValue> {
        self.value.as_ref().or(self.default.as_ref())
    }

    fn set_value(&mut self, value: ParamValue) -> Result<(), ConfigError> {
        if value.type_str() != self.type_str {
            return Err(ConfigError::Parse {
                name: self.name.clone(),
                message: format!(
                    "type mismatch: expected {}, got {}",
                    self.type_str,
                    value.type_str()
                ),
            });
        }
        if let Some(validator) = &self.validator
            && !validator(&value)
        {
            return Err(ConfigError::Validation {
                name: self.name.clone(),
                value: value.render(),
            });
        }
        self.value = Some(value);
        Ok(())
    }

    fn set_from_config(&mut self, raw: &ConfigValue) -> Result<(), ConfigError> {
        let parsed = (self.parse)(&self.name, raw)?;
        self.set_value(parsed)
    }
}

/// Ordered registry of a component's parameters.
#[derive(Debug, Default)]
pub struct ParameterSet {
    params: BTreeMap<String, ParameterImpl>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter. Duplicate names fail.
    pub fn register<T: ParamType>(
        &mut self,
        name: &str,
        description: &str,
        default: Option<T>,
    ) -> Result<(), ConfigError> {
        if self.params.contains_key(name) {
            return Err(ConfigError::Registration(name.to_string()));
        }
        self.params.insert(
            name.to_string(),
            ParameterImpl {
                name: name.to_string(),
                description: description.to_string(),
                type_str: T::TYPE_STR,
                parse: T::parse,
                default: default.map(ParamType::into_value),
                value: None,
                validator: None,
            },
        );
        Ok(())
    }

    /// Install a validator. The predicate is total over the typed value;
    /// values of the wrong variant are rejected outright.
    pub fn set_validator<T, F>(&mut self, name: &str, validator: F) -> Result<(), ConfigError>
    where
        T: ParamType,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let param = self
            .params
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownParameter(name.to_string()))?;
        param.validator = Some(Box::new(move |value| {
            T::from_value(value).is_some_and(|typed| validator(&typed))
        }));
        Ok(())
    }

    /// Remove an installed validator; subsequent sets accept any value again.
    pub fn clear_validator(&mut self, name: &str) -> Result<(), ConfigError> {
        let param = self
            .params
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownParameter(name.to_string()))?;
        param.validator = None;
        Ok(())
    }

    pub fn set<T: ParamType>(&mut self, name: &str, value: T) -> Result<(), ConfigError> {
        let param = self
            .params
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownParameter(name.to_string()))?;
        param.set_value(value.into_value())
    }

    /// The effective typed value (set value, else default).
    pub fn get<T: ParamType>(&self, name: &str) -> Option<T> {
        self.params
            .get(name)
            .and_then(|p| p.effective())
            .and_then(T::from_value)
    }

    /// Like [`get`](Self::get) but an error when absent, for parameters
    /// without defaults that the component requires.
    pub fn get_required<T: ParamType>(&self, name: &str) -> Result<T, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownParameter(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.params.get(name).is_some_and(ParameterImpl::is_set)
    }

    pub fn param(&self, name: &str) -> Option<&ParameterImpl> {
        self.params.get(name)
    }

    /// Bind a steering section: every key matching a registered parameter is
    /// parsed and set; unknown keys are ignored; missing keys keep defaults.
    pub fn bind(&mut self, section: &ConfigSection) -> Result<(), ConfigError> {
        for (key, raw) in section.values() {
            if let Some(param) = self.params.get_mut(key) {
                param.set_from_config(raw)?;
            }
        }
        Ok(())
    }

    /// Reset every parameter to its default.
    pub fn unset_all(&mut self) {
        for param in self.params.values_mut() {
            param.reset();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterImpl> {
        self.params.values()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with(params: &[(&str, &str)]) -> ConfigSection {
        let mut section = ConfigSection::new("test");
        for (k, v) in params {
            section.set(k, ConfigValue::Scalar((*v).to_string()));
        }
        section
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut set = ParameterSet::new();
        set.register::<i64>("N", "a number", Some(1)).unwrap();
        assert!(matches!(
            set.register::<i64>("N", "again", None),
            Err(ConfigError::Registration(_))
        ));
    }

    #[test]
    fn default_until_set() {
        let mut set = ParameterSet::new();
        set.register::<i64>("N", "a number", Some(42)).unwrap();
        assert_eq!(set.get::<i64>("N"), Some(42));
        assert!(!set.is_set("N"));
        set.set("N", 7i64).unwrap();
        assert_eq!(set.get::<i64>("N"), Some(7));
        assert!(set.is_set("N"));
    }

    #[test]
    fn validator_rejects_without_partial_update() {
        let mut set = ParameterSet::new();
        set.register::<i64>("N", "positive", Some(1)).unwrap();
        set.set_validator::<i64, _>("N", |n| *n > 0).unwrap();
        set.set("N", 5i64).unwrap();
        let err = set.set("N", -3i64).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert_eq!(set.get::<i64>("N"), Some(5), "rejected set must not update");
    }

    #[test]
    fn cleared_validator_accepts_again() {
        let mut set = ParameterSet::new();
        set.register::<i64>("N", "any", None).unwrap();
        set.set_validator::<i64, _>("N", |n| *n > 0).unwrap();
        assert!(set.set("N", -1i64).is_err());
        set.clear_validator("N").unwrap();
        set.set("N", -1i64).unwrap();
        assert_eq!(set.get::<i64>("N"), Some(-1));
    }

    #[test]
    fn bind_ignores_unknown_keys_and_keeps_defaults() {
        let mut set = ParameterSet::new();
        set.register::<i64>("Known", "known", Some(3)).unwrap();
        set.register::<String>("Missing", "untouched", Some("dflt".into()))
            .unwrap();
        let section = set_with(&[("Known", "9"), ("Unknown", "whatever")]);
        set.bind(&section).unwrap();
        assert_eq!(set.get::<i64>("Known"), Some(9));
        assert_eq!(set.get::<String>("Missing").as_deref(), Some("dflt"));
    }

    #[test]
    fn bind_surfaces_parse_errors() {
        let mut set = ParameterSet::new();
        set.register::<i64>("N", "number", None).unwrap();
        let section = set_with(&[("N", "not-a-number")]);
        assert!(matches!(
            set.bind(&section),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn textual_round_trip_for_dump() {
        let mut set = ParameterSet::new();
        set.register::<Vec<i64>>("List", "ids", Some(vec![1, 2]))
            .unwrap();
        let param = set.param("List").unwrap();
        assert_eq!(param.type_str(), "vector<int>");
        assert_eq!(param.str(), "", "unset renders empty");
        assert_eq!(param.default_str(), "1 2");
    }

    #[test]
    fn reset_falls_back_to_default() {
        let mut set = ParameterSet::new();
        set.register::<bool>("Flag", "a flag", Some(true)).unwrap();
        set.set("Flag", false).unwrap();
        assert_eq!(set.get::<bool>("Flag"), Some(false));
        set.unset_all();
        assert_eq!(set.get::<bool>("Flag"), Some(true));
    }
}
