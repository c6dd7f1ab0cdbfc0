//! # Gesture
//!
//! Hand and face landmarks to control values and note events.
//!
//! - [`interpreter`]: pure functions (palm-up, depth, face orientation)
//! - [`sound`]: stateful note gating with hysteresis and debounce

pub mod interpreter;
pub mod sound;

pub use interpreter::{
    face_orientation, hand_state, palm_up, side_camera_depth, single_camera_depth, DepthSource,
};
pub use sound::{NoteCounts, SoundMapper};
