//! Per-event ancillary state.
//!
//! Extensions form a type-indexed bag attached to each event. An extension
//! value is constructed lazily on first access and never shared between
//! events; only the worker currently owning the event touches the bag, so
//! access goes through plain `&mut`.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::seed::ProcessorId;

/// Type-indexed container for event-local state.
#[derive(Default)]
pub struct Extensions {
    entries: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    /// Fetch the extension, constructing it on first access.
    pub fn get_or_insert_with<T: Any + Send>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        self.entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(init()))
            .downcast_mut::<T>()
            .expect("extension entry keyed by its own TypeId")
    }

    /// Insert, replacing any previous value of the same type.
    pub fn insert<T: Any + Send>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn contains<T: Any + Send>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }
}

/// Per-processor random seeds, populated once per event by the scheduler.
#[derive(Debug, Default)]
pub struct RandomSeeds {
    seeds: HashMap<ProcessorId, u32>,
}

impl RandomSeeds {
    pub fn new(seeds: HashMap<ProcessorId, u32>) -> Self {
        Self { seeds }
    }

    pub fn seed(&self, id: ProcessorId) -> Option<u32> {
        self.seeds.get(&id).copied()
    }
}

/// Boolean return values recorded by processors, unnamed and named, for
/// downstream branching.
#[derive(Debug, Default)]
pub struct ProcessorConditions {
    unnamed: HashMap<ProcessorId, bool>,
    named: HashMap<String, bool>,
}

impl ProcessorConditions {
    pub fn set(&mut self, id: ProcessorId, value: bool) {
        self.unnamed.insert(id, value);
    }

    /// Named conditions are scoped by processor name:
    /// `"<processor>.<condition>"`.
    pub fn set_named(&mut self, processor_name: &str, condition: &str, value: bool) {
        self.named
            .insert(format!("{processor_name}.{condition}"), value);
    }

    pub fn get(&self, id: ProcessorId) -> Option<bool> {
        self.unnamed.get(&id).copied()
    }

    pub fn get_named(&self, key: &str) -> Option<bool> {
        self.named.get(key).copied()
    }
}

/// Marks the first event pushed into the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsFirstEvent(pub bool);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::ProcessorId;

    #[test]
    fn lazy_construction_on_first_access() {
        let mut ext = Extensions::new();
        assert!(!ext.contains::<IsFirstEvent>());
        let flag = ext.get_or_insert_with(IsFirstEvent::default);
        assert!(!flag.0);
        flag.0 = true;
        assert!(ext.get::<IsFirstEvent>().unwrap().0, "mutation persists");
    }

    #[test]
    fn insert_replaces() {
        let mut ext = Extensions::new();
        ext.insert(IsFirstEvent(true));
        ext.insert(IsFirstEvent(false));
        assert!(!ext.get::<IsFirstEvent>().unwrap().0);
    }

    #[test]
    fn conditions_unnamed_and_named() {
        let mut conditions = ProcessorConditions::default();
        let id = ProcessorId::next();
        conditions.set(id, true);
        conditions.set_named("Selector", "Calibrating", false);
        assert_eq!(conditions.get(id), Some(true));
        assert_eq!(conditions.get_named("Selector.Calibrating"), Some(false));
        assert_eq!(conditions.get_named("Selector.Missing"), None);
    }

    #[test]
    fn seeds_lookup() {
        let id = ProcessorId::next();
        let seeds = RandomSeeds::new(HashMap::from([(id, 7u32)]));
        assert_eq!(seeds.seed(id), Some(7));
        assert_eq!(seeds.seed(ProcessorId::next()), None);
    }
}
