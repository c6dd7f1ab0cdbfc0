//! Landmark sets - Landmark Worker output
//!
//! Detected anatomical keypoints in normalized image coordinates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ContractError, Frame};

/// Hand landmark indices (21-point hand model)
pub mod hand_landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_TIP: usize = 20;

    /// Number of points in a complete hand set
    pub const COUNT: usize = 21;

    /// Bone pairs used for overlay drawing
    pub const CONNECTIONS: &[(usize, usize)] = &[
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 4),
        (0, 5),
        (5, 6),
        (6, 7),
        (7, 8),
        (5, 9),
        (9, 10),
        (10, 11),
        (11, 12),
        (9, 13),
        (13, 14),
        (14, 15),
        (15, 16),
        (13, 17),
        (17, 18),
        (18, 19),
        (19, 20),
        (0, 17),
    ];
}

/// Face mesh landmark indices (468-point face model)
pub mod face_landmarks {
    pub const NOSE_TIP: usize = 4;
    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_OUTER: usize = 263;

    /// Number of points in a complete face mesh
    pub const COUNT: usize = 468;

    /// Points used for orientation, in overlay order
    pub const KEY_POINTS: [usize; 5] = [
        NOSE_TIP,
        LEFT_EYE_OUTER,
        LEFT_EYE_INNER,
        RIGHT_EYE_INNER,
        RIGHT_EYE_OUTER,
    ];
}

/// A single keypoint (x, y in [0, 1] image space; z relative depth)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// All coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Hand classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    #[serde(alias = "Left")]
    Left,
    #[serde(alias = "Right")]
    Right,
}

impl Handedness {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "Left"),
            Self::Right => write!(f, "Right"),
        }
    }
}

impl FromStr for Handedness {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(ContractError::Other(format!("unknown handedness '{other}'"))),
        }
    }
}

/// Ordered landmark points plus an optional classification label.
///
/// Immutable once constructed; cloning always copies the points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    handedness: Option<Handedness>,
}

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>, handedness: Option<Handedness>) -> Self {
        Self {
            landmarks,
            handedness,
        }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness
    }
}

/// Tracked modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Hand,
    Face,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hand => "hand",
            Self::Face => "face",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit passed from a Landmark Worker to the orchestrator.
///
/// `frame` is exactly the input that produced `landmark_sets`.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub modality: Modality,
    pub landmark_sets: Vec<LandmarkSet>,
    pub frame: Frame,
}

impl DetectionResult {
    pub fn first(&self) -> Option<&LandmarkSet> {
        self.landmark_sets.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handedness_parse() {
        assert_eq!("Left".parse::<Handedness>().unwrap(), Handedness::Left);
        assert_eq!(" right ".parse::<Handedness>().unwrap(), Handedness::Right);
        assert!("middle".parse::<Handedness>().is_err());
    }

    #[test]
    fn test_landmark_set_json_accepts_model_labels() {
        let json = r#"{"landmarks":[{"x":0.5,"y":0.25,"z":0.0}],"handedness":"Left"}"#;
        let set: LandmarkSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.handedness(), Some(Handedness::Left));
        assert_eq!(set.get(0), Some(&Landmark::new(0.5, 0.25, 0.0)));
        assert!(set.get(1).is_none());
    }

    #[test]
    fn test_planar_distance_ignores_depth() {
        let a = Landmark::new(0.0, 0.0, 5.0);
        let b = Landmark::new(0.3, 0.4, -5.0);
        assert!((a.planar_distance(&b) - 0.5).abs() < 1e-6);
    }
}
