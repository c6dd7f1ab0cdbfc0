//! Session telemetry samples (append-only, owned by the recorder)

use serde::{Deserialize, Serialize};

use crate::FaceOrientation;

/// One face orientation measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceOrientationSample {
    pub timestamp: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl FaceOrientationSample {
    pub fn new(timestamp: f64, orientation: FaceOrientation) -> Self {
        Self {
            timestamp,
            yaw: orientation.yaw,
            pitch: orientation.pitch,
            roll: orientation.roll,
        }
    }
}

/// One hand position (middle-finger base) measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandTrajectorySample {
    pub timestamp: f64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub is_palm_up: bool,
}
