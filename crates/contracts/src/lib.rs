//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace:
//! the data model (frames, landmark sets, note events, telemetry samples),
//! the capability traits for external collaborators (capture devices,
//! landmark detectors, audio outputs), the error taxonomy and the session
//! blueprint. Business crates depend on this crate only, never on each other
//! in reverse.
//!
//! ## Time Model
//! - Wall-clock seconds since the UNIX epoch (`f64`) is the only clock
//! - `Frame::seq` is a per-source capture counter, used for ordering/diagnostics

mod audio;
mod blueprint;
mod detector;
mod error;
mod frame;
mod frame_source;
mod gesture;
mod landmark;
mod note;
mod telemetry;

pub use audio::{AudioBackend, AudioOutput};
pub use blueprint::*;
pub use detector::{DetectorFactory, LandmarkDetector};
pub use error::*;
pub use frame::{unix_timestamp, Frame};
pub use frame_source::FrameSource;
pub use gesture::{FaceOrientation, HandState};
pub use landmark::{
    face_landmarks, hand_landmarks, DetectionResult, Handedness, Landmark, LandmarkSet, Modality,
};
pub use note::{NoteEvent, NoteKind};
pub use telemetry::{FaceOrientationSample, HandTrajectorySample};
