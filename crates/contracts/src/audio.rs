//! Audio backend abstraction (note-event sink)

use crate::{ContractError, NoteEvent};

/// Enumerates and opens note outputs (MIDI ports, synthesizers, ...)
pub trait AudioBackend {
    /// Backend name (used in logs)
    fn name(&self) -> &str;

    /// Names of the outputs currently available
    fn list_outputs(&self) -> Result<Vec<String>, ContractError>;

    /// Open the named output.
    ///
    /// # Errors
    /// [`ContractError::DeviceUnavailable`] if no such output exists or it is busy
    fn open(&self, name: &str) -> Result<Box<dyn AudioOutput>, ContractError>;
}

/// Open note output
pub trait AudioOutput: Send {
    /// Output name
    fn name(&self) -> &str;

    /// Deliver a single note event
    ///
    /// # Errors
    /// [`ContractError::BackendFailure`] when the device has gone away
    fn send(&mut self, event: &NoteEvent) -> Result<(), ContractError>;

    /// Release the output. Must be idempotent.
    fn close(&mut self);
}
