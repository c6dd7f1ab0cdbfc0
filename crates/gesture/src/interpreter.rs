//! Gesture Interpreter
//!
//! Stateless mapping from landmark sets to control values. Functions that
//! cannot find the landmarks they need return `None` (or a neutral value)
//! and log; they never fail the tick.

use contracts::{
    face_landmarks, hand_landmarks, FaceOrientation, GestureConfig, HandState, Handedness,
    Landmark, LandmarkSet,
};
use tracing::{debug, warn};

/// Where the depth estimate comes from
#[derive(Debug, Clone, Copy)]
pub enum DepthSource<'a> {
    /// Wrist to middle-finger-base distance in the hand camera
    SingleCamera,
    /// First hand seen by the side camera, if any
    SideCamera(Option<&'a LandmarkSet>),
}

fn point(set: &LandmarkSet, index: usize) -> Option<Landmark> {
    set.get(index).copied().filter(Landmark::is_finite)
}

/// Palm orientation from the index and pinky fingertips.
///
/// For a right hand the palm faces up when the index tip lies right of the
/// pinky tip; the comparison flips for a left hand.
pub fn palm_up(hand: &LandmarkSet, handedness: Handedness) -> Option<bool> {
    let index = point(hand, hand_landmarks::INDEX_FINGER_TIP)?;
    let pinky = point(hand, hand_landmarks::PINKY_TIP)?;
    Some(match handedness {
        Handedness::Right => index.x > pinky.x,
        Handedness::Left => index.x < pinky.x,
    })
}

/// `max(|mcp9 - wrist| - offset, 0) * scale`
pub fn single_camera_depth(hand: &LandmarkSet, config: &GestureConfig) -> Option<f32> {
    let wrist = point(hand, hand_landmarks::WRIST)?;
    let base = point(hand, hand_landmarks::MIDDLE_FINGER_MCP)?;
    let distance = base.planar_distance(&wrist);
    Some((distance - config.depth_offset).max(0.0) * config.depth_scale)
}

/// `max((reference - x9) * scale, 0)`, or the configured default when the
/// side camera saw no hand
pub fn side_camera_depth(side: Option<&LandmarkSet>, config: &GestureConfig) -> f32 {
    match side.and_then(|set| point(set, hand_landmarks::MIDDLE_FINGER_MCP)) {
        Some(base) => ((config.side_reference_x - base.x) * config.side_scale).max(0.0),
        None => config.side_default_depth,
    }
}

/// Control values of one hand.
///
/// Hands without a handedness label are treated as right hands.
pub fn hand_state(
    hand: &LandmarkSet,
    depth_source: DepthSource<'_>,
    config: &GestureConfig,
) -> Option<HandState> {
    let handedness = hand.handedness().unwrap_or(Handedness::Right);
    let Some(base) = point(hand, hand_landmarks::MIDDLE_FINGER_MCP) else {
        warn!(landmarks = hand.len(), "hand landmarks incomplete, tick skipped");
        return None;
    };
    let Some(is_palm_up) = palm_up(hand, handedness) else {
        warn!(landmarks = hand.len(), "fingertips missing, tick skipped");
        return None;
    };
    let depth = match depth_source {
        DepthSource::SingleCamera => single_camera_depth(hand, config)?,
        DepthSource::SideCamera(side) => side_camera_depth(side, config),
    };

    Some(HandState {
        x: base.x,
        y: base.y,
        depth,
        is_palm_up,
        handedness,
    })
}

/// Head yaw / pitch / roll in degrees.
///
/// yaw and pitch measure the nose offset from the outer-eye midpoint against
/// the eye distance; roll is the slope of the outer-eye line. Missing or
/// non-finite landmarks give [`FaceOrientation::ZERO`].
pub fn face_orientation(face: &LandmarkSet) -> FaceOrientation {
    let points = (
        point(face, face_landmarks::NOSE_TIP),
        point(face, face_landmarks::LEFT_EYE_OUTER),
        point(face, face_landmarks::RIGHT_EYE_OUTER),
        point(face, face_landmarks::LEFT_EYE_INNER),
        point(face, face_landmarks::RIGHT_EYE_INNER),
    );
    let (Some(nose), Some(left_outer), Some(right_outer), Some(_), Some(_)) = points else {
        warn!(landmarks = face.len(), "face landmarks incomplete, orientation zeroed");
        return FaceOrientation::ZERO;
    };

    let eye_mid_x = f64::from(left_outer.x + right_outer.x) / 2.0;
    let eye_mid_y = f64::from(left_outer.y + right_outer.y) / 2.0;
    let eye_distance = f64::from((left_outer.x - right_outer.x).abs());

    let yaw = (f64::from(nose.x) - eye_mid_x).atan2(eye_distance).to_degrees();
    let pitch = (f64::from(nose.y) - eye_mid_y).atan2(eye_distance).to_degrees();
    let dy = f64::from(right_outer.y - left_outer.y);
    let dx = f64::from(right_outer.x - left_outer.x);
    let roll = dy.atan2(dx).to_degrees();

    debug!(yaw, pitch, roll, "face orientation");
    FaceOrientation { yaw, pitch, roll }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devices::{face_pose, hand_pose};

    fn config() -> GestureConfig {
        GestureConfig::default()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_palm_up_inverts_with_handedness() {
        for palm in [true, false] {
            let hand = hand_pose(0.5, 0.5, 0.25, Handedness::Right, palm);
            assert_eq!(palm_up(&hand, Handedness::Right), Some(palm));
            assert_eq!(palm_up(&hand, Handedness::Left), Some(!palm));
        }
    }

    #[test]
    fn test_single_camera_depth_zero_below_offset_and_grows_with_span() {
        let config = config();
        let near = hand_pose(0.5, 0.5, 0.1, Handedness::Right, true);
        assert_eq!(single_camera_depth(&near, &config), Some(0.0));

        let mut last = 0.0;
        for span in [0.19, 0.22, 0.3, 0.45] {
            let hand = hand_pose(0.5, 0.5, span, Handedness::Right, true);
            let depth = single_camera_depth(&hand, &config).unwrap();
            assert!(depth > last, "depth {depth} not above {last} for span {span}");
            last = depth;
        }

        let hand = hand_pose(0.5, 0.5, 0.28, Handedness::Right, true);
        let depth = single_camera_depth(&hand, &config).unwrap();
        assert!((depth - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_side_camera_depth() {
        let config = config();
        let side = hand_pose(0.5, 0.4, 0.2, Handedness::Right, true);
        assert!((side_camera_depth(Some(&side), &config) - 0.4).abs() < 1e-5);

        let beyond = hand_pose(0.9, 0.4, 0.2, Handedness::Right, true);
        assert_eq!(side_camera_depth(Some(&beyond), &config), 0.0);
        assert_eq!(side_camera_depth(None, &config), 0.5);
    }

    #[test]
    fn test_hand_state_uses_label_and_depth_source() {
        let config = config();
        let hand = hand_pose(0.3, 0.6, 0.25, Handedness::Left, true);
        let state = hand_state(&hand, DepthSource::SingleCamera, &config).unwrap();
        assert_eq!(state.handedness, Handedness::Left);
        assert!(state.is_palm_up);
        assert!((state.x - 0.3).abs() < 1e-6);
        assert!((state.y - 0.6).abs() < 1e-6);

        let state = hand_state(&hand, DepthSource::SideCamera(None), &config).unwrap();
        assert_eq!(state.depth, 0.5);
    }

    #[test]
    fn test_hand_state_incomplete_set() {
        let partial = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.0); 5], None);
        assert!(hand_state(&partial, DepthSource::SingleCamera, &config()).is_none());
    }

    #[test]
    fn test_frontal_face_is_zero() {
        let o = face_orientation(&face_pose(0.5, 0.45, 0.0));
        assert!(close(o.yaw, 0.0) && close(o.pitch, 0.0) && close(o.roll, 0.0));
    }

    #[test]
    fn test_turned_and_tilted_face() {
        let o = face_orientation(&face_pose(0.5, 0.45, 0.2));
        assert!(close(o.yaw, 45.0));

        let mut points = face_pose(0.5, 0.5, 0.0).landmarks().to_vec();
        points[face_landmarks::RIGHT_EYE_OUTER].y += 0.2;
        let o = face_orientation(&LandmarkSet::new(points, None));
        assert!(close(o.roll, 45.0));
    }

    #[test]
    fn test_missing_face_landmarks_zero() {
        let short = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.0); 10], None);
        assert_eq!(face_orientation(&short), FaceOrientation::ZERO);

        let mut points = face_pose(0.5, 0.5, 0.0).landmarks().to_vec();
        points[face_landmarks::NOSE_TIP].x = f32::NAN;
        assert_eq!(
            face_orientation(&LandmarkSet::new(points, None)),
            FaceOrientation::ZERO
        );
    }
}
