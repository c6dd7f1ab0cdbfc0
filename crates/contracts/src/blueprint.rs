//! SessionBlueprint - Config Loader output
//!
//! Describes a complete session: capture devices, landmark models, pipeline
//! timing, gesture calibration, sound mapping and recorder outputs.
//! Every tuned constant is a field with its calibrated value as default.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{Handedness, Modality};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete session blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SessionBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Run limits and output location
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    /// Capture devices
    #[serde(default)]
    #[validate(nested)]
    pub cameras: CamerasConfig,

    /// Landmark models
    #[serde(default)]
    #[validate(nested)]
    pub detectors: DetectorsConfig,

    /// Queue depth and timeouts
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineSettings,

    /// Gesture interpreter calibration
    #[serde(default)]
    #[validate(nested)]
    pub gesture: GestureConfig,

    /// Sound mapper
    #[serde(default)]
    #[validate(nested)]
    pub sound: SoundConfig,

    /// Session recorder outputs
    #[serde(default)]
    #[validate(nested)]
    pub recorder: RecorderConfig,
}

/// Run limits and output location
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Parent directory; each run creates a timestamped subdirectory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Stop after this many orchestrator ticks
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_frames: Option<u64>,

    /// Stop after this many seconds
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub timeout_secs: Option<f64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_frames: None,
            timeout_secs: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Capture devices
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CamerasConfig {
    /// Camera watching the playing hand
    #[serde(default = "CameraConfig::default_hand")]
    #[validate(nested)]
    pub hand: CameraConfig,

    /// Camera watching the face
    #[serde(default = "CameraConfig::default_face")]
    #[validate(nested)]
    pub face: CameraConfig,

    /// Optional side view of the hand, used for the side-camera depth estimate
    #[serde(default)]
    #[validate(nested)]
    pub side: Option<CameraConfig>,
}

impl Default for CamerasConfig {
    fn default() -> Self {
        Self {
            hand: CameraConfig::default_hand(),
            face: CameraConfig::default_face(),
            side: None,
        }
    }
}

/// Capture device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    /// Generated test pattern
    #[default]
    Synthetic,
    /// Replay of a directory of still images (sorted by file name)
    ImageSequence,
    /// Physical capture device by index (needs the `opencv` feature of `devices`)
    Device,
}

/// Single capture device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    /// Unique identifier
    #[validate(length(min = 1))]
    pub device_id: String,

    #[serde(default)]
    pub kind: CameraKind,

    #[serde(default = "default_width")]
    #[validate(range(min = 1, max = 8192))]
    pub width: u32,

    #[serde(default = "default_height")]
    #[validate(range(min = 1, max = 8192))]
    pub height: u32,

    /// Nominal capture rate (Hz)
    #[serde(default = "default_fps")]
    #[validate(range(exclusive_min = 0.0, max = 240.0))]
    pub fps: f64,

    /// Sleep between reads to hold the nominal rate
    #[serde(default)]
    pub throttle: bool,

    /// Capture index for `device` (0 = first camera)
    #[serde(default)]
    pub index: Option<i32>,

    /// Image directory for `image_sequence`
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// End the stream after this many frames
    #[serde(default)]
    pub frame_limit: Option<u64>,

    /// Restart an image sequence when it runs out
    #[serde(default)]
    pub loop_playback: bool,
}

impl CameraConfig {
    pub fn synthetic(device_id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            device_id: device_id.into(),
            kind: CameraKind::Synthetic,
            width,
            height,
            fps: default_fps(),
            throttle: false,
            index: None,
            path: None,
            frame_limit: None,
            loop_playback: false,
        }
    }

    /// Physical camera at `index`
    pub fn device(device_id: impl Into<String>, index: i32, width: u32, height: u32) -> Self {
        Self {
            kind: CameraKind::Device,
            index: Some(index),
            ..Self::synthetic(device_id, width, height)
        }
    }

    fn default_hand() -> Self {
        Self::synthetic("hand_cam", default_width(), default_height())
    }

    fn default_face() -> Self {
        Self::synthetic("face_cam", default_width(), default_height())
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> f64 {
    20.0
}

/// Landmark models, one per modality
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DetectorsConfig {
    /// Used for both the hand and the side camera
    #[serde(default = "DetectorConfig::default_hand")]
    #[validate(nested)]
    pub hand: DetectorConfig,

    #[serde(default = "DetectorConfig::default_face")]
    #[validate(nested)]
    pub face: DetectorConfig,
}

impl Default for DetectorsConfig {
    fn default() -> Self {
        Self {
            hand: DetectorConfig::default_hand(),
            face: DetectorConfig::default_face(),
        }
    }
}

impl DetectorsConfig {
    pub fn for_modality(&self, modality: Modality) -> &DetectorConfig {
        match modality {
            Modality::Hand => &self.hand,
            Modality::Face => &self.face,
        }
    }
}

/// Landmark model kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Procedural landmarks (no model)
    #[default]
    Synthetic,
    /// Landmark sets replayed from a JSON-lines file, one line per frame
    Scripted,
    /// External model process speaking JSON lines over stdin/stdout
    Process,
}

/// Single landmark model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DetectorConfig {
    #[serde(default)]
    pub kind: DetectorKind,

    /// JSON-lines file for `scripted`
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Executable for `process`
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Parameters of the `synthetic` model
    #[serde(default)]
    #[validate(nested)]
    pub synthetic: SyntheticDetectorConfig,
}

impl DetectorConfig {
    fn default_hand() -> Self {
        Self {
            kind: DetectorKind::Synthetic,
            script: None,
            command: None,
            args: Vec::new(),
            synthetic: SyntheticDetectorConfig::default(),
        }
    }

    fn default_face() -> Self {
        Self::default_hand()
    }
}

/// Procedural landmark generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SyntheticDetectorConfig {
    /// Invert the palm every N detections (0 = never)
    #[serde(default = "default_palm_flip_every")]
    pub palm_flip_every: u32,

    /// Label attached to generated hands
    #[serde(default = "default_handedness")]
    pub handedness: Handedness,

    /// Normalized (x, y) of the middle-finger base
    #[serde(default = "default_position")]
    pub position: [f32; 2],

    /// Distance from wrist to middle-finger base
    #[serde(default = "default_hand_span")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub hand_span: f32,

    /// Move the hand once across the frame every N detections (0 = fixed)
    #[serde(default)]
    pub sweep_period: u32,

    /// Number of hands reported per detection
    #[serde(default = "default_hand_count")]
    #[validate(range(max = 4))]
    pub hands: usize,

    /// Simulated inference time per detection (ms)
    #[serde(default)]
    #[validate(range(max = 1000))]
    pub latency_ms: u64,
}

impl Default for SyntheticDetectorConfig {
    fn default() -> Self {
        Self {
            palm_flip_every: default_palm_flip_every(),
            handedness: default_handedness(),
            position: default_position(),
            hand_span: default_hand_span(),
            sweep_period: 0,
            hands: default_hand_count(),
            latency_ms: 0,
        }
    }
}

fn default_palm_flip_every() -> u32 {
    10
}

fn default_handedness() -> Handedness {
    Handedness::Right
}

fn default_position() -> [f32; 2] {
    [0.5, 0.5]
}

fn default_hand_span() -> f32 {
    0.25
}

fn default_hand_count() -> usize {
    1
}

/// Queue depth and timeouts of the capture/inference pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PipelineSettings {
    /// Bounded depth of every worker channel
    #[serde(default = "default_queue_depth")]
    #[validate(range(min = 1, max = 1024))]
    pub queue_depth: usize,

    /// Orchestrator wait when a worker input is full (frame dropped after)
    #[serde(default = "default_short_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// Orchestrator wait for a worker result (iteration skipped after)
    #[serde(default = "default_short_timeout_ms")]
    pub result_timeout_ms: u64,

    /// Worker wait on its input before re-checking cancellation
    #[serde(default = "default_worker_poll_ms")]
    #[validate(range(min = 1))]
    pub worker_poll_ms: u64,

    /// Worker wait when its output is full (result dropped after)
    #[serde(default = "default_short_timeout_ms")]
    pub worker_output_timeout_ms: u64,

    /// Bound on joining each worker at shutdown
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// Bound on collecting in-flight results after end of stream
    #[serde(default = "default_join_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Consecutive failed reads that end a stream
    #[serde(default = "default_max_read_failures")]
    #[validate(range(min = 1))]
    pub max_consecutive_read_failures: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            submit_timeout_ms: default_short_timeout_ms(),
            result_timeout_ms: default_short_timeout_ms(),
            worker_poll_ms: default_worker_poll_ms(),
            worker_output_timeout_ms: default_short_timeout_ms(),
            join_timeout_ms: default_join_timeout_ms(),
            drain_timeout_ms: default_join_timeout_ms(),
            max_consecutive_read_failures: default_max_read_failures(),
        }
    }
}

fn default_queue_depth() -> usize {
    10
}

fn default_short_timeout_ms() -> u64 {
    100
}

fn default_worker_poll_ms() -> u64 {
    1000
}

fn default_join_timeout_ms() -> u64 {
    2000
}

fn default_max_read_failures() -> u32 {
    2
}

/// Depth estimate source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    /// Wrist to middle-finger-base distance on the hand camera
    #[default]
    SingleCamera,
    /// Horizontal position on the side camera
    SideCamera,
}

/// Gesture interpreter calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GestureConfig {
    #[serde(default)]
    pub depth_mode: DepthMode,

    /// Subtracted from the wrist distance before scaling
    #[serde(default = "default_depth_offset")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub depth_offset: f32,

    #[serde(default = "default_depth_scale")]
    #[validate(range(exclusive_min = 0.0))]
    pub depth_scale: f32,

    /// Side-camera x at which depth reaches zero
    #[serde(default = "default_side_reference_x")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub side_reference_x: f32,

    #[serde(default = "default_depth_scale")]
    #[validate(range(exclusive_min = 0.0))]
    pub side_scale: f32,

    /// Depth used while the side camera sees no hand
    #[serde(default = "default_side_default_depth")]
    #[validate(range(min = 0.0))]
    pub side_default_depth: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            depth_mode: DepthMode::SingleCamera,
            depth_offset: default_depth_offset(),
            depth_scale: default_depth_scale(),
            side_reference_x: default_side_reference_x(),
            side_scale: default_depth_scale(),
            side_default_depth: default_side_default_depth(),
        }
    }
}

fn default_depth_offset() -> f32 {
    0.18
}

fn default_depth_scale() -> f32 {
    2.0
}

fn default_side_reference_x() -> f32 {
    0.7
}

fn default_side_default_depth() -> f32 {
    0.5
}

/// Sound mapper: pitch grid, gating and output selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SoundConfig {
    /// Output port name (first available when unset)
    #[serde(default)]
    pub output: Option<String>,

    /// Continue without sound when no output exists
    #[serde(default)]
    pub allow_silent: bool,

    /// MIDI channel used as the voice
    #[serde(default)]
    #[validate(range(max = 15))]
    pub channel: u8,

    #[serde(default = "default_velocity")]
    #[validate(range(min = 1, max = 127))]
    pub velocity: u8,

    /// Pitch of the bottom-left grid cell
    #[serde(default = "default_base_note")]
    #[validate(range(max = 127))]
    pub base_note: u8,

    /// Semitone offsets of one octave of the scale
    #[serde(default = "default_scale")]
    #[validate(length(min = 1, max = 12))]
    pub scale: Vec<u8>,

    /// Horizontal grid cells
    #[serde(default = "default_columns")]
    #[validate(range(min = 1, max = 64))]
    pub columns: u32,

    /// Vertical grid cells (one octave each)
    #[serde(default = "default_rows")]
    #[validate(range(min = 1, max = 8))]
    pub rows: u32,

    /// Semitone intervals sounded together (0 = root only)
    #[serde(default = "default_chord")]
    #[validate(length(min = 1, max = 8))]
    pub chord: Vec<u8>,

    /// Depth at or above which the gate opens
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub activation_depth: f32,

    /// Gate closes below `activation_depth - hysteresis`
    #[serde(default = "default_hysteresis")]
    #[validate(range(min = 0.0))]
    pub hysteresis: f32,

    /// Only a palm-up hand sounds
    #[serde(default = "default_true")]
    pub require_palm_up: bool,

    /// Silence the mapper when the hand leaves the frame
    #[serde(default = "default_true")]
    pub release_on_hand_loss: bool,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            output: None,
            allow_silent: false,
            channel: 0,
            velocity: default_velocity(),
            base_note: default_base_note(),
            scale: default_scale(),
            columns: default_columns(),
            rows: default_rows(),
            chord: default_chord(),
            activation_depth: 0.0,
            hysteresis: default_hysteresis(),
            require_palm_up: true,
            release_on_hand_loss: true,
        }
    }
}

fn default_velocity() -> u8 {
    100
}

fn default_base_note() -> u8 {
    48
}

fn default_scale() -> Vec<u8> {
    vec![0, 2, 4, 7, 9]
}

fn default_columns() -> u32 {
    10
}

fn default_rows() -> u32 {
    3
}

fn default_chord() -> Vec<u8> {
    vec![0]
}

fn default_hysteresis() -> f32 {
    0.02
}

fn default_true() -> bool {
    true
}

/// Session recorder outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RecorderConfig {
    /// Samples shown in the trajectory trail
    #[serde(default = "default_trail_length")]
    #[validate(range(min = 1))]
    pub trail_length: usize,

    #[serde(default = "default_animation_fps")]
    #[validate(range(min = 1, max = 100))]
    pub animation_fps: u32,

    /// Animation frames beyond this are skipped evenly
    #[serde(default = "default_max_animation_frames")]
    #[validate(range(min = 1))]
    pub max_animation_frames: usize,

    /// Orientation plot width (pixels)
    #[serde(default = "default_plot_width")]
    #[validate(range(min = 64, max = 8192))]
    pub plot_width: u32,

    /// Orientation plot height (pixels)
    #[serde(default = "default_plot_height")]
    #[validate(range(min = 64, max = 8192))]
    pub plot_height: u32,

    /// Animation canvas side (pixels)
    #[serde(default = "default_animation_size")]
    #[validate(range(min = 32, max = 4096))]
    pub animation_size: u32,

    /// Frame rate written into the video headers
    #[serde(default = "default_animation_fps")]
    #[validate(range(min = 1, max = 240))]
    pub video_fps: u32,

    /// Encode the annotated camera streams
    #[serde(default = "default_true")]
    pub write_videos: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            trail_length: default_trail_length(),
            animation_fps: default_animation_fps(),
            max_animation_frames: default_max_animation_frames(),
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
            animation_size: default_animation_size(),
            video_fps: default_animation_fps(),
            write_videos: true,
        }
    }
}

fn default_trail_length() -> usize {
    30
}

fn default_animation_fps() -> u32 {
    20
}

fn default_max_animation_frames() -> usize {
    900
}

fn default_plot_width() -> u32 {
    1200
}

fn default_plot_height() -> u32 {
    1200
}

fn default_animation_size() -> u32 {
    480
}

impl SessionBlueprint {
    /// Whether a side camera participates in the run
    pub fn uses_side_camera(&self) -> bool {
        self.cameras.side.is_some() && self.gesture.depth_mode == DepthMode::SideCamera
    }

    /// Every configured camera, hand first
    pub fn all_cameras(&self) -> impl Iterator<Item = &CameraConfig> {
        [Some(&self.cameras.hand), Some(&self.cameras.face), self.cameras.side.as_ref()]
            .into_iter()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let bp = SessionBlueprint::default();
        assert!(bp.validate().is_ok());
        assert_eq!(bp.pipeline.queue_depth, 10);
        assert_eq!(bp.pipeline.join_timeout_ms, 2000);
        assert_eq!(bp.gesture.depth_offset, 0.18);
        assert_eq!(bp.recorder.trail_length, 30);
    }

    #[test]
    fn test_range_violation_is_reported() {
        let mut bp = SessionBlueprint::default();
        bp.sound.channel = 16;
        bp.pipeline.queue_depth = 0;
        let errors = bp.validate().unwrap_err();
        let text = errors.to_string();
        assert!(text.contains("channel"), "got: {text}");
        assert!(text.contains("queue_depth"), "got: {text}");
    }

    #[test]
    fn test_side_camera_requires_mode() {
        let mut bp = SessionBlueprint::default();
        bp.cameras.side = Some(CameraConfig::synthetic("side_cam", 320, 240));
        assert!(!bp.uses_side_camera());
        bp.gesture.depth_mode = DepthMode::SideCamera;
        assert!(bp.uses_side_camera());
        assert_eq!(bp.all_cameras().count(), 3);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let bp: SessionBlueprint = serde_json::from_str("{}").unwrap();
        assert_eq!(bp.cameras.hand.device_id, "hand_cam");
        assert_eq!(bp.sound.scale, vec![0, 2, 4, 7, 9]);
        assert!(bp.cameras.side.is_none());
    }
}
