//! midir MIDI backend

use contracts::{AudioBackend, AudioOutput, ContractError, NoteEvent};
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

const CLIENT_NAME: &str = "handsynth";

/// System MIDI outputs (CoreMIDI / ALSA / WinMM)
#[derive(Debug, Default)]
pub struct MidirBackend;

impl MidirBackend {
    pub fn new() -> Self {
        Self
    }

    fn client(&self) -> Result<MidiOutput, ContractError> {
        MidiOutput::new(CLIENT_NAME)
            .map_err(|e| ContractError::device_unavailable("midi", format!("MIDI init error: {e}")))
    }
}

impl AudioBackend for MidirBackend {
    fn name(&self) -> &str {
        "midir"
    }

    fn list_outputs(&self) -> Result<Vec<String>, ContractError> {
        let client = self.client()?;
        let names = client
            .ports()
            .iter()
            .filter_map(|port| client.port_name(port).ok())
            .collect();
        Ok(names)
    }

    fn open(&self, name: &str) -> Result<Box<dyn AudioOutput>, ContractError> {
        let client = self.client()?;
        let ports = client.ports();
        let port = ports
            .iter()
            .find(|port| client.port_name(port).is_ok_and(|n| n == name))
            .ok_or_else(|| ContractError::device_unavailable(name, "no such MIDI output"))?;

        let conn = client
            .connect(port, "handsynth-out")
            .map_err(|e| ContractError::device_unavailable(name, format!("connect failed: {e}")))?;
        info!(port = %name, "opened MIDI output");

        Ok(Box::new(MidirOutput {
            name: name.to_string(),
            conn: Some(conn),
        }))
    }
}

/// Open MIDI port
pub struct MidirOutput {
    name: String,
    conn: Option<MidiOutputConnection>,
}

impl AudioOutput for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, event: &NoteEvent) -> Result<(), ContractError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| ContractError::backend_failure(&self.name, "output closed"))?;
        conn.send(&event.to_midi())
            .map_err(|e| ContractError::backend_failure(&self.name, e.to_string()))
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
            debug!(port = %self.name, "MIDI output closed");
        }
    }
}

impl Drop for MidirOutput {
    fn drop(&mut self) {
        self.close();
    }
}
