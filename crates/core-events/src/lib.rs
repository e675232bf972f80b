//! Core event records flowing through the processing pipeline.
//!
//! An [`EventStore`] is one unit of input: an opaque payload (the concrete
//! record type belongs to the data source that produced it), a stable uid
//! derived from the event and run numbers, and a type-indexed
//! [`Extensions`](extensions::Extensions) bag for per-event ancillary state.
//! A [`RunHeader`] describes a group of events; headers are broadcast to
//! every processor instance in emission order.
//!
//! Events are owned by exactly one thread at a time (producer, then one
//! worker, then the application for release), so nothing here carries locks.

use std::any::Any;
use std::collections::BTreeMap;

pub mod extensions;
pub mod seed;
pub mod uid;

pub use extensions::{Extensions, IsFirstEvent, ProcessorConditions, RandomSeeds};
pub use seed::{ProcessorId, RandomSeedManager};
pub use uid::event_uid;

/// One event record: opaque payload, stable uid, per-event extensions.
pub struct EventStore {
    uid: u32,
    payload: Box<dyn Any + Send>,
    extensions: Extensions,
}

impl EventStore {
    /// Wrap a payload, deriving the uid from the event and run numbers.
    pub fn new<T: Any + Send>(event_number: i32, run_number: i32, payload: T) -> Self {
        Self {
            uid: event_uid(event_number, run_number),
            payload: Box::new(payload),
            extensions: Extensions::new(),
        }
    }

    /// Deterministic hash of `(event_number, run_number)`.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Typed view onto the underlying record.
    pub fn event<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn event_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.downcast_mut::<T>()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore").field("uid", &self.uid).finish()
    }
}

/// Metadata describing a group of events.
///
/// Run number, detector name and description are first-class; anything else
/// travels in the string-keyed parameter map.
#[derive(Debug, Default)]
pub struct RunHeader {
    run_number: i32,
    detector_name: String,
    description: String,
    parameters: BTreeMap<String, Vec<String>>,
}

impl RunHeader {
    pub fn new(run_number: i32) -> Self {
        Self {
            run_number,
            ..Self::default()
        }
    }

    pub fn run_number(&self) -> i32 {
        self.run_number
    }

    pub fn detector_name(&self) -> &str {
        &self.detector_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_detector_name(mut self, name: impl Into<String>) -> Self {
        self.detector_name = name.into();
        self
    }

    pub fn set_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.parameters.insert(key.into(), values);
    }

    pub fn parameter(&self, key: &str) -> Option<&[String]> {
        self.parameters.get(key).map(Vec::as_slice)
    }

    pub fn parameters(&self) -> &BTreeMap<String, Vec<String>> {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_payload_access() {
        let mut event = EventStore::new(7, 1, vec![1u8, 2, 3]);
        assert_eq!(event.event::<Vec<u8>>().unwrap().len(), 3);
        assert!(event.event::<String>().is_none(), "wrong type yields None");
        event.event_mut::<Vec<u8>>().unwrap().push(4);
        assert_eq!(event.event::<Vec<u8>>().unwrap().len(), 4);
    }

    #[test]
    fn run_header_builder_and_parameters() {
        let mut header = RunHeader::new(3)
            .set_detector_name("ExampleDetector")
            .set_description("calibration run");
        header.set_parameter("ActiveSubdetectors", vec!["tracker".into()]);
        assert_eq!(header.run_number(), 3);
        assert_eq!(header.detector_name(), "ExampleDetector");
        assert_eq!(
            header.parameter("ActiveSubdetectors"),
            Some(&["tracker".to_string()][..])
        );
        assert_eq!(header.parameter("Missing"), None);
    }
}
