//! Procedural landmark models
//!
//! Produce anatomically plausible point layouts keyed on the frame sequence
//! number, so a replayed run always yields the same landmarks.

use std::f32::consts::TAU;
use std::thread;
use std::time::Duration;

use contracts::{
    face_landmarks, hand_landmarks, ContractError, Frame, Handedness, Landmark, LandmarkDetector,
    LandmarkSet, SyntheticDetectorConfig,
};

/// Lateral spacing between neighbouring fingers, relative to the hand span
const FINGER_SPACING: f32 = 0.3;
/// Length of one finger segment, relative to the hand span
const SEGMENT: f32 = 0.3;

fn simulate_latency(config: &SyntheticDetectorConfig) {
    if config.latency_ms > 0 {
        thread::sleep(Duration::from_millis(config.latency_ms));
    }
}

/// Hand model driven by [`SyntheticDetectorConfig`]
#[derive(Debug, Clone)]
pub struct SyntheticHandDetector {
    config: SyntheticDetectorConfig,
}

impl SyntheticHandDetector {
    pub fn new(config: SyntheticDetectorConfig) -> Self {
        Self { config }
    }

    /// Palm state for the given frame: up first, inverting every `palm_flip_every`
    pub fn palm_up_at(&self, seq: u64) -> bool {
        match self.config.palm_flip_every {
            0 => true,
            every => (seq / u64::from(every)) % 2 == 0,
        }
    }

    fn position_at(&self, seq: u64) -> (f32, f32) {
        let [x, y] = self.config.position;
        match self.config.sweep_period {
            0 => (x, y),
            period => {
                let phase = (seq % u64::from(period)) as f32 / period as f32;
                (0.1 + 0.8 * phase, y)
            }
        }
    }
}

/// Build a 21-point hand whose middle-finger base sits at (`x`, `y`).
///
/// The wrist is `span` below the base. Index and pinky tips are placed on
/// opposite sides so that the palm-up rule (index vs pinky x, flipped by
/// handedness) yields `palm_up`.
pub fn hand_pose(x: f32, y: f32, span: f32, handedness: Handedness, palm_up: bool) -> LandmarkSet {
    let index_side = if (handedness == Handedness::Right) == palm_up {
        1.0
    } else {
        -1.0
    };

    let mut points = vec![Landmark::default(); hand_landmarks::COUNT];
    points[hand_landmarks::WRIST] = Landmark::new(x, y + span, 0.0);

    // finger 0 = thumb .. 4 = pinky; middle finger (2) is centred on x
    for finger in 0..5usize {
        let lateral = index_side * (2.0 - finger as f32) * FINGER_SPACING * span;
        for joint in 0..4usize {
            let idx = 1 + finger * 4 + joint;
            points[idx] = Landmark::new(
                x + lateral,
                y - joint as f32 * SEGMENT * span,
                -0.02 * joint as f32,
            );
        }
    }

    LandmarkSet::new(points, Some(handedness))
}

impl LandmarkDetector for SyntheticHandDetector {
    fn name(&self) -> &str {
        "synthetic-hand"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ContractError> {
        simulate_latency(&self.config);
        let palm_up = self.palm_up_at(frame.seq);
        let (x, y) = self.position_at(frame.seq);
        let mut handedness = self.config.handedness;
        let sets = (0..self.config.hands)
            .map(|i| {
                // additional hands are placed left of the first and alternate labels
                let offset = 0.2 * i as f32;
                let set = hand_pose(x - offset, y, self.config.hand_span, handedness, palm_up);
                handedness = handedness.opposite();
                set
            })
            .collect();
        Ok(sets)
    }
}

/// Face model: frontal, level head; yaw swings when `sweep_period` is set
#[derive(Debug, Clone)]
pub struct SyntheticFaceDetector {
    config: SyntheticDetectorConfig,
}

impl SyntheticFaceDetector {
    pub fn new(config: SyntheticDetectorConfig) -> Self {
        Self { config }
    }
}

/// Build a 468-point face mesh with the orientation key points placed
/// symmetrically around (`cx`, `cy`); `nose_dx` shifts the nose sideways.
pub fn face_pose(cx: f32, cy: f32, nose_dx: f32) -> LandmarkSet {
    let mut points = vec![Landmark::new(cx, cy, 0.0); face_landmarks::COUNT];
    points[face_landmarks::LEFT_EYE_OUTER] = Landmark::new(cx - 0.1, cy, 0.0);
    points[face_landmarks::LEFT_EYE_INNER] = Landmark::new(cx - 0.04, cy, 0.0);
    points[face_landmarks::RIGHT_EYE_INNER] = Landmark::new(cx + 0.04, cy, 0.0);
    points[face_landmarks::RIGHT_EYE_OUTER] = Landmark::new(cx + 0.1, cy, 0.0);
    points[face_landmarks::NOSE_TIP] = Landmark::new(cx + nose_dx, cy, -0.05);
    LandmarkSet::new(points, None)
}

impl LandmarkDetector for SyntheticFaceDetector {
    fn name(&self) -> &str {
        "synthetic-face"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ContractError> {
        simulate_latency(&self.config);
        let [cx, cy] = self.config.position;
        let nose_dx = match self.config.sweep_period {
            0 => 0.0,
            period => {
                let phase = (frame.seq % u64::from(period)) as f32 / period as f32;
                0.05 * (phase * TAU).sin()
            }
        };
        Ok(vec![face_pose(cx, cy, nose_dx)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::hand_landmarks::{INDEX_FINGER_TIP, MIDDLE_FINGER_MCP, PINKY_TIP, WRIST};

    fn frame(seq: u64) -> Frame {
        Frame::filled(seq, 0.0, 4, 4, [0, 0, 0])
    }

    #[test]
    fn test_palm_flips_every_n_frames() {
        let detector = SyntheticHandDetector::new(SyntheticDetectorConfig::default());
        assert!(detector.palm_up_at(0));
        assert!(detector.palm_up_at(9));
        assert!(!detector.palm_up_at(10));
        assert!(detector.palm_up_at(20));
    }

    #[test]
    fn test_hand_pose_geometry() {
        let set = hand_pose(0.5, 0.5, 0.25, Handedness::Right, true);
        assert_eq!(set.len(), 21);
        let base = set.get(MIDDLE_FINGER_MCP).unwrap();
        assert_eq!((base.x, base.y), (0.5, 0.5));
        let wrist = set.get(WRIST).unwrap();
        assert!((base.planar_distance(wrist) - 0.25).abs() < 1e-6);
        assert!(set.get(INDEX_FINGER_TIP).unwrap().x > set.get(PINKY_TIP).unwrap().x);

        let left = hand_pose(0.5, 0.5, 0.25, Handedness::Left, true);
        assert!(left.get(INDEX_FINGER_TIP).unwrap().x < left.get(PINKY_TIP).unwrap().x);
    }

    #[test]
    fn test_multiple_hands_alternate_labels() {
        let config = SyntheticDetectorConfig {
            hands: 2,
            ..Default::default()
        };
        let mut detector = SyntheticHandDetector::new(config);
        let sets = detector.detect(&frame(0)).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].handedness(), Some(Handedness::Right));
        assert_eq!(sets[1].handedness(), Some(Handedness::Left));
    }

    #[test]
    fn test_face_is_symmetric_without_sweep() {
        let mut detector = SyntheticFaceDetector::new(SyntheticDetectorConfig::default());
        let sets = detector.detect(&frame(7)).unwrap();
        let face = &sets[0];
        assert_eq!(face.len(), face_landmarks::COUNT);
        let nose = face.get(face_landmarks::NOSE_TIP).unwrap();
        let l = face.get(face_landmarks::LEFT_EYE_OUTER).unwrap();
        let r = face.get(face_landmarks::RIGHT_EYE_OUTER).unwrap();
        assert!((nose.x - (l.x + r.x) / 2.0).abs() < 1e-6);
        assert_eq!(l.y, r.y);
    }

    #[test]
    fn test_latency_is_simulated() {
        let config = SyntheticDetectorConfig {
            latency_ms: 30,
            ..Default::default()
        };
        let mut detector = SyntheticFaceDetector::new(config);
        let started = std::time::Instant::now();
        detector.detect(&frame(0)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
