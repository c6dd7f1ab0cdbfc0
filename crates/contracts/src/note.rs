//! NoteEvent - Sound Mapper output

use serde::{Deserialize, Serialize};

/// Note transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    On,
    Off,
}

/// A note-on or note-off for one voice.
///
/// Consumed immediately by the audio output; never retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Voice (MIDI channel, 0-15)
    pub voice: u8,
    /// MIDI note number (0-127)
    pub pitch: u8,
    pub velocity: u8,
    pub kind: NoteKind,
    /// Emission time (seconds since UNIX epoch)
    pub timestamp: f64,
}

impl NoteEvent {
    pub fn on(voice: u8, pitch: u8, velocity: u8, timestamp: f64) -> Self {
        Self {
            voice,
            pitch,
            velocity,
            kind: NoteKind::On,
            timestamp,
        }
    }

    pub fn off(voice: u8, pitch: u8, timestamp: f64) -> Self {
        Self {
            voice,
            pitch,
            velocity: 0,
            kind: NoteKind::Off,
            timestamp,
        }
    }

    pub fn is_on(&self) -> bool {
        self.kind == NoteKind::On
    }

    /// Raw MIDI channel message
    pub fn to_midi(&self) -> [u8; 3] {
        let channel = self.voice & 0x0F;
        match self.kind {
            NoteKind::On => [0x90 | channel, self.pitch & 0x7F, self.velocity & 0x7F],
            NoteKind::Off => [0x80 | channel, self.pitch & 0x7F, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_encoding() {
        assert_eq!(NoteEvent::on(1, 60, 100, 0.0).to_midi(), [0x91, 60, 100]);
        assert_eq!(NoteEvent::off(1, 60, 0.0).to_midi(), [0x81, 60, 0]);
    }
}
