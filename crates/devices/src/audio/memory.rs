//! In-memory audio backends
//!
//! - `NullOutput`: discards everything (silent runs)
//! - `MemoryBackend`: records every event for inspection, optionally
//!   failing after a number of sends to emulate a vanished device

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{AudioBackend, AudioOutput, ContractError, NoteEvent};

/// Backend with no outputs; used when MIDI support is compiled out
#[derive(Debug, Default)]
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn list_outputs(&self) -> Result<Vec<String>, ContractError> {
        Ok(Vec::new())
    }

    fn open(&self, name: &str) -> Result<Box<dyn AudioOutput>, ContractError> {
        Err(ContractError::device_unavailable(name, "no audio outputs available"))
    }
}

/// Discarding output
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn name(&self) -> &str {
        "null"
    }

    fn send(&mut self, _event: &NoteEvent) -> Result<(), ContractError> {
        Ok(())
    }

    fn close(&mut self) {}
}

#[derive(Debug, Default)]
struct EventLog {
    events: Vec<NoteEvent>,
    closed: usize,
}

/// Recording backend with a single output named `memory`
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    log: Arc<Mutex<EventLog>>,
    fail_after: Option<usize>,
    fail_once_at: Option<usize>,
}

impl MemoryBackend {
    pub const OUTPUT_NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Sends beyond `count` fail with `BackendFailure`
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    /// Only the send attempt at `attempt` (0-based) fails
    pub fn failing_once_at(attempt: usize) -> Self {
        Self {
            fail_once_at: Some(attempt),
            ..Self::default()
        }
    }

    /// Events delivered so far
    pub fn events(&self) -> Vec<NoteEvent> {
        lock(&self.log).events.clone()
    }

    /// Number of times an output was closed
    pub fn close_count(&self) -> usize {
        lock(&self.log).closed
    }
}

fn lock(log: &Mutex<EventLog>) -> MutexGuard<'_, EventLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AudioBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_outputs(&self) -> Result<Vec<String>, ContractError> {
        Ok(vec![Self::OUTPUT_NAME.to_string()])
    }

    fn open(&self, name: &str) -> Result<Box<dyn AudioOutput>, ContractError> {
        if name != Self::OUTPUT_NAME {
            return Err(ContractError::device_unavailable(name, "no such output"));
        }
        Ok(Box::new(MemoryOutput {
            log: Arc::clone(&self.log),
            fail_after: self.fail_after,
            fail_once_at: self.fail_once_at,
            attempts: 0,
            sent: 0,
            open: true,
        }))
    }
}

struct MemoryOutput {
    log: Arc<Mutex<EventLog>>,
    fail_after: Option<usize>,
    fail_once_at: Option<usize>,
    attempts: usize,
    sent: usize,
    open: bool,
}

impl AudioOutput for MemoryOutput {
    fn name(&self) -> &str {
        MemoryBackend::OUTPUT_NAME
    }

    fn send(&mut self, event: &NoteEvent) -> Result<(), ContractError> {
        if !self.open {
            return Err(ContractError::backend_failure("memory", "output closed"));
        }
        let attempt = self.attempts;
        self.attempts += 1;
        if self.fail_once_at == Some(attempt) {
            return Err(ContractError::backend_failure("memory", "transient send error"));
        }
        if self.fail_after.is_some_and(|limit| self.sent >= limit) {
            return Err(ContractError::backend_failure("memory", "device disconnected"));
        }
        self.sent += 1;
        lock(&self.log).events.push(*event);
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            lock(&self.log).closed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_records_and_fails() {
        let backend = MemoryBackend::failing_after(1);
        let mut out = backend.open(MemoryBackend::OUTPUT_NAME).unwrap();
        out.send(&NoteEvent::on(0, 60, 100, 0.0)).unwrap();
        assert!(matches!(
            out.send(&NoteEvent::off(0, 60, 0.0)),
            Err(ContractError::BackendFailure { .. })
        ));
        out.close();
        out.close();
        assert_eq!(backend.events().len(), 1);
        assert_eq!(backend.close_count(), 1);
    }

    #[test]
    fn test_single_failed_send() {
        let backend = MemoryBackend::failing_once_at(0);
        let mut out = backend.open(MemoryBackend::OUTPUT_NAME).unwrap();
        assert!(out.send(&NoteEvent::on(0, 60, 100, 0.0)).is_err());
        out.send(&NoteEvent::on(0, 60, 100, 0.0)).unwrap();
        assert_eq!(backend.events().len(), 1);
    }

    #[test]
    fn test_unknown_output_is_unavailable() {
        assert!(MemoryBackend::new().open("IAC Bus").is_err());
        assert!(NullBackend.open("anything").is_err());
    }
}
