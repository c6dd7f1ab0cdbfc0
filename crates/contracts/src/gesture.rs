//! Per-tick gesture state derived by the interpreter

use serde::{Deserialize, Serialize};

use crate::Handedness;

/// Control values of the sound-driving hand for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandState {
    /// Normalized horizontal position of the middle-finger base
    pub x: f32,
    /// Normalized vertical position of the middle-finger base
    pub y: f32,
    /// Depth proxy (single- or side-camera estimate)
    pub depth: f32,
    pub is_palm_up: bool,
    pub handedness: Handedness,
}

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceOrientation {
    /// Left/right rotation (-: left, +: right)
    pub yaw: f64,
    /// Up/down rotation (-: up, +: down)
    pub pitch: f64,
    /// Head tilt (-: left, +: right)
    pub roll: f64,
}

impl FaceOrientation {
    pub const ZERO: Self = Self {
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
    };
}
