//! Pull-based producers of events and run headers.

use core_events::{EventStore, RunHeader};
use tracing::error;

use crate::component::Component;
use crate::SourceError;

pub type EventCallback = Box<dyn FnMut(EventStore) -> Result<(), SourceError> + Send + Sync>;
pub type RunHeaderCallback = Box<dyn FnMut(RunHeader) -> Result<(), SourceError> + Send + Sync>;

/// Callback pair a source forwards decoded records through. Forwarding
/// without a registered callback is a programming error.
#[derive(Default)]
pub struct SourceCallbacks {
    on_event: Option<EventCallback>,
    on_run_header: Option<RunHeaderCallback>,
}

impl SourceCallbacks {
    pub fn on_event_read(&mut self, callback: EventCallback) {
        self.on_event = Some(callback);
    }

    pub fn on_run_header_read(&mut self, callback: RunHeaderCallback) {
        self.on_run_header = Some(callback);
    }

    pub fn forward_event(&mut self, event: EventStore) -> Result<(), SourceError> {
        match &mut self.on_event {
            Some(callback) => callback(event),
            None => Err(SourceError::MissingCallback("onEventRead")),
        }
    }

    pub fn forward_run_header(&mut self, header: RunHeader) -> Result<(), SourceError> {
        match &mut self.on_run_header {
            Some(callback) => callback(header),
            None => Err(SourceError::MissingCallback("onRunHeaderRead")),
        }
    }
}

/// A data source component. The concrete record format lives behind this
/// interface; the framework only sees events and run headers.
pub trait DataSource: Component {
    /// Access the registered callbacks. Implementors store a
    /// [`SourceCallbacks`] and forward decoded records through it.
    fn callbacks(&mut self) -> &mut SourceCallbacks;

    /// Bind parameters and open the input.
    fn init(&mut self) -> Result<(), SourceError>;

    /// Read one record, forwarding it through exactly one callback.
    /// `Ok(false)` signals end of stream.
    fn read_one(&mut self) -> Result<bool, SourceError>;

    /// Loop over [`read_one`](Self::read_one) until the stream ends. A
    /// malformed record is logged and exhausts the source; a stop request
    /// and a missing callback propagate.
    fn read_all(&mut self) -> Result<(), SourceError> {
        loop {
            match self.read_one() {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(
                    err @ (SourceError::Stop
                    | SourceError::MissingCallback(_)
                    | SourceError::Fatal(_)),
                ) => {
                    return Err(err);
                }
                Err(err) => {
                    error!(target: "runtime.source", error = %err, "data_source_error");
                    return Ok(());
                }
            }
        }
    }
}
