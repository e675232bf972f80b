//! Base state shared by every configurable component.

use core_config::{ConfigError, ConfigSection, ParameterSet};
use core_events::ProcessorId;

/// Identity, description and parameters of one component instance.
///
/// Embedded by every concrete component; the [`Component`] trait exposes it
/// uniformly. The instance name defaults to the component type until the
/// configuration assigns one.
#[derive(Debug)]
pub struct ComponentBase {
    component_type: String,
    name: String,
    description: String,
    id: ProcessorId,
    params: ParameterSet,
}

impl ComponentBase {
    pub fn new(component_type: impl Into<String>) -> Self {
        let component_type = component_type.into();
        let mut params = ParameterSet::new();
        params
            .register::<String>(
                "Verbosity",
                "Per-component verbosity level (empty inherits the global level)",
                Some(String::new()),
            )
            .expect("first registration on a fresh parameter set");
        Self {
            name: component_type.clone(),
            component_type,
            description: String::new(),
            id: ProcessorId::next(),
            params,
        }
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Process-unique instance id; keys seeds and return values.
    pub fn id(&self) -> ProcessorId {
        self.id
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    pub fn bind_parameters(&mut self, section: &ConfigSection) -> Result<(), ConfigError> {
        self.params.bind(section)
    }

    pub fn verbosity(&self) -> String {
        self.params.get::<String>("Verbosity").unwrap_or_default()
    }
}

/// Anything configurable: processors, data sources, schedulers, managers.
pub trait Component: Send + Sync {
    fn base(&self) -> &ComponentBase;
    fn base_mut(&mut self) -> &mut ComponentBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn component_type(&self) -> &str {
        self.base().component_type()
    }

    fn description(&self) -> &str {
        self.base().description()
    }

    fn id(&self) -> core_events::ProcessorId {
        self.base().id()
    }

    /// Bulk-bind from the component's configuration section.
    fn set_parameters(&mut self, section: &ConfigSection) -> Result<(), ConfigError> {
        self.base_mut().bind_parameters(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::ConfigValue;

    struct Probe {
        base: ComponentBase,
    }

    impl Component for Probe {
        fn base(&self) -> &ComponentBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }
    }

    #[test]
    fn name_defaults_to_type() {
        let probe = Probe {
            base: ComponentBase::new("Probe"),
        };
        assert_eq!(probe.name(), "Probe");
        assert_eq!(probe.component_type(), "Probe");
    }

    #[test]
    fn verbosity_parameter_always_present() {
        let mut probe = Probe {
            base: ComponentBase::new("Probe"),
        };
        assert!(probe.base().parameters().exists("Verbosity"));
        let mut section = ConfigSection::new("Probe");
        section.set("Verbosity", ConfigValue::scalar("debug"));
        probe.set_parameters(&section).unwrap();
        assert_eq!(probe.base().verbosity(), "debug");
    }

    #[test]
    fn ids_distinguish_instances() {
        let a = ComponentBase::new("X");
        let b = ComponentBase::new("X");
        assert_ne!(a.id(), b.id());
    }
}
