//! Sound Mapper
//!
//! Turns the sound-driving hand into note-on/off events:
//!
//! - (x, y) is quantized on a `columns × rows` grid into a scale degree and
//!   an octave, optionally expanded into a chord
//! - palm-up and a depth threshold gate sounding; once open, the gate only
//!   closes below `activation_depth - hysteresis`
//! - while sounding, moving the hand does not retrigger. A palm flip or a
//!   gate close re-arms the mapper (`changeable`)

use std::collections::BTreeSet;

use contracts::{unix_timestamp, AudioOutput, HandState, Handedness, NoteEvent, SoundConfig};
use tracing::{debug, error, info, warn};

/// Event totals since the mapper was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteCounts {
    pub note_on: u64,
    pub note_off: u64,
    pub send_failures: u64,
}

/// Stateful note generator bound to one audio output
pub struct SoundMapper {
    config: SoundConfig,
    output: Option<Box<dyn AudioOutput>>,
    sounding: BTreeSet<u8>,
    /// gate currently open
    active: bool,
    changeable: bool,
    is_palm_up: bool,
    depth: f32,
    handedness: Option<Handedness>,
    muted: bool,
    /// `end()` in progress: note-offs are attempted even when muted
    flushing: bool,
    counts: NoteCounts,
}

impl SoundMapper {
    pub fn new(config: SoundConfig, output: Box<dyn AudioOutput>) -> Self {
        info!(output = output.name(), channel = config.channel, "sound mapper ready");
        Self {
            config,
            output: Some(output),
            sounding: BTreeSet::new(),
            active: false,
            changeable: true,
            is_palm_up: false,
            depth: 0.0,
            handedness: None,
            muted: false,
            flushing: false,
            counts: NoteCounts::default(),
        }
    }

    /// Palm state of the latest hand update
    pub fn is_palm_up(&self) -> bool {
        self.is_palm_up
    }

    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness
    }

    /// Pitches currently sounding
    pub fn sounding(&self) -> &BTreeSet<u8> {
        &self.sounding
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_ended(&self) -> bool {
        self.output.is_none()
    }

    pub fn counts(&self) -> NoteCounts {
        self.counts
    }

    /// Record the orientation context of the sound-driving hand.
    ///
    /// A palm flip re-arms the mapper.
    pub fn update_hand_orientation(&mut self, state: &HandState) {
        if state.is_palm_up != self.is_palm_up {
            debug!(palm_up = state.is_palm_up, "palm flipped");
            self.changeable = true;
        }
        self.is_palm_up = state.is_palm_up;
        self.depth = state.depth;
        self.handedness = Some(state.handedness);
    }

    /// Notes that should sound for a hand at (x, y).
    ///
    /// `depth` and `is_palm_up` override the context from
    /// [`update_hand_orientation`](Self::update_hand_orientation).
    pub fn new_notes(
        &mut self,
        x: f32,
        y: f32,
        depth: Option<f32>,
        is_palm_up: Option<bool>,
    ) -> BTreeSet<u8> {
        if let Some(palm) = is_palm_up {
            if palm != self.is_palm_up {
                self.changeable = true;
            }
            self.is_palm_up = palm;
        }
        let depth = depth.unwrap_or(self.depth);

        let palm_ok = !self.config.require_palm_up || self.is_palm_up;
        let threshold = if self.active {
            self.config.activation_depth - self.config.hysteresis
        } else {
            self.config.activation_depth
        };

        if !(palm_ok && depth >= threshold) {
            if self.active {
                debug!(depth, palm_up = self.is_palm_up, "gate closed");
            }
            self.active = false;
            self.changeable = true;
            return BTreeSet::new();
        }

        if !self.active {
            debug!(depth, "gate opened");
            self.active = true;
        }

        if self.changeable {
            self.changeable = false;
            self.chord_at(x, y)
        } else {
            self.sounding.clone()
        }
    }

    /// Move from the sounding set to `notes`: note-offs first, then note-ons.
    ///
    /// Returns the events in emission order.
    pub fn update_notes(&mut self, notes: &BTreeSet<u8>) -> Vec<NoteEvent> {
        if self.is_ended() {
            return Vec::new();
        }

        let now = unix_timestamp();
        let voice = self.config.channel;
        let offs: Vec<u8> = self.sounding.difference(notes).copied().collect();
        let ons: Vec<u8> = notes.difference(&self.sounding).copied().collect();

        let mut events = Vec::with_capacity(offs.len() + ons.len());
        for pitch in offs {
            self.sounding.remove(&pitch);
            events.push(NoteEvent::off(voice, pitch, now));
        }
        for pitch in ons {
            self.sounding.insert(pitch);
            events.push(NoteEvent::on(voice, pitch, self.config.velocity, now));
        }

        for event in &events {
            self.send(event);
        }
        events
    }

    /// The hand left the frame
    pub fn hand_lost(&mut self) -> Vec<NoteEvent> {
        self.active = false;
        self.changeable = true;
        if self.config.release_on_hand_loss {
            self.update_notes(&BTreeSet::new())
        } else {
            Vec::new()
        }
    }

    /// Silence every sounding note and release the output. Idempotent.
    pub fn end(&mut self) {
        if self.is_ended() {
            return;
        }
        if self.muted && !self.sounding.is_empty() {
            info!(notes = self.sounding.len(), "muted, still attempting note-offs");
        }
        self.flushing = true;
        let released = self.update_notes(&BTreeSet::new());
        self.flushing = false;
        if let Some(mut output) = self.output.take() {
            output.close();
            info!(
                output = output.name(),
                released = released.len(),
                note_on = self.counts.note_on,
                note_off = self.counts.note_off,
                "sound mapper ended"
            );
        }
    }

    fn send(&mut self, event: &NoteEvent) {
        let label = if event.is_on() { "on" } else { "off" };
        metrics::counter!("handsynth_note_events_total", "kind" => label).increment(1);
        if event.is_on() {
            self.counts.note_on += 1;
        } else {
            self.counts.note_off += 1;
        }

        if self.muted && !self.flushing {
            return;
        }
        let Some(output) = self.output.as_mut() else {
            return;
        };
        if let Err(e) = output.send(event) {
            self.counts.send_failures += 1;
            if self.flushing {
                warn!(output = output.name(), pitch = event.pitch, error = %e, "note-off failed at end");
            } else {
                self.muted = true;
                error!(output = output.name(), error = %e, "audio backend failed, muting");
            }
        }
    }

    fn chord_at(&self, x: f32, y: f32) -> BTreeSet<u8> {
        let root = self.grid_pitch(x, y);
        self.config
            .chord
            .iter()
            .filter_map(|interval| {
                let pitch = root + u32::from(*interval);
                match u8::try_from(pitch) {
                    Ok(p) if p <= 127 => Some(p),
                    _ => {
                        warn!(pitch, "note out of MIDI range, skipped");
                        None
                    }
                }
            })
            .collect()
    }

    /// `base + 12·row + scale[col % len] + 12·(col / len)`
    fn grid_pitch(&self, x: f32, y: f32) -> u32 {
        let columns = self.config.columns.max(1);
        let rows = self.config.rows.max(1);
        let col = cell(x, columns);
        let row = cell(1.0 - y, rows);

        let scale = &self.config.scale;
        let (step, octave) = match scale.len() as u32 {
            0 => (0, 0),
            len => (u32::from(scale[(col % len) as usize]), col / len),
        };
        u32::from(self.config.base_note) + 12 * row + step + 12 * octave
    }
}

impl Drop for SoundMapper {
    fn drop(&mut self) {
        self.end();
    }
}

/// Cell index of `value` in `count` equal bins over [0, 1]
fn cell(value: f32, count: u32) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    let idx = (value * count as f32).floor();
    (idx.max(0.0) as u32).min(count - 1)
}
