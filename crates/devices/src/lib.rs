//! # Devices
//!
//! Concrete capabilities behind the contracts traits.
//!
//! Responsibilities:
//! - Open capture devices from `SessionBlueprint` (synthetic / image sequence / physical)
//! - Build landmark models (synthetic / scripted / external process)
//! - Select and open the note output (MIDI / silent / in-memory)
//! - Roll back partially opened devices on failure
//!
//! ## Feature Flags
//!
//! - `midi`: Enable the midir MIDI backend
//! - `opencv`: Enable physical cameras through OpenCV

pub mod audio;
pub mod camera;
pub mod detector;
pub mod factory;

pub use audio::{system_backend, MemoryBackend, NullBackend, NullOutput};
pub use camera::{ImageSequenceCamera, SyntheticCamera};
pub use detector::{
    face_pose, hand_pose, ProcessDetector, ScriptedDetector, SyntheticFaceDetector,
    SyntheticHandDetector,
};
pub use factory::{CameraSet, DeviceFactory};

#[cfg(feature = "opencv")]
pub use camera::DeviceCamera;
#[cfg(feature = "midi")]
pub use audio::{MidirBackend, MidirOutput};
