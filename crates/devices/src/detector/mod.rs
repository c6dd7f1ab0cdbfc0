//! Landmark models
//!
//! - Synthetic: procedural hands/faces
//! - Scripted: recorded replies replayed per frame
//! - Process: external model over a JSON-lines pipe

mod process;
mod scripted;
mod synthetic;

pub use process::ProcessDetector;
pub use scripted::ScriptedDetector;
pub use synthetic::{face_pose, hand_pose, SyntheticFaceDetector, SyntheticHandDetector};

use contracts::{ContractError, LandmarkSet};
use serde::Deserialize;

/// One model reply as it appears in scripts and on the process pipe
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum DetectorReply {
    Sets(Vec<LandmarkSet>),
    Failure { error: String },
    Detected { landmark_sets: Vec<LandmarkSet> },
}

impl DetectorReply {
    pub(crate) fn into_result(self, detector: &str) -> Result<Vec<LandmarkSet>, ContractError> {
        match self {
            Self::Sets(sets) | Self::Detected { landmark_sets: sets } => Ok(sets),
            Self::Failure { error } => Err(ContractError::transient_frame(detector, error)),
        }
    }
}
