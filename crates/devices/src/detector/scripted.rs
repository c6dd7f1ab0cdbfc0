//! Scripted detector - 按帧回放录制的 landmark
//!
//! Each line of the script is the reply for one frame (line `n` answers the
//! frame with `seq = n`, cycling when the script is shorter than the run).

use std::path::Path;

use contracts::{ContractError, Frame, LandmarkDetector, LandmarkSet};
use tracing::info;

use super::DetectorReply;

/// Replays pre-recorded detector replies
#[derive(Debug)]
pub struct ScriptedDetector {
    name: String,
    replies: Vec<DetectorReply>,
}

impl ScriptedDetector {
    /// Load a JSON-lines script.
    ///
    /// Blank lines mean "nothing detected".
    pub fn load(path: &Path) -> Result<Self, ContractError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContractError::device_unavailable(path.display().to_string(), e.to_string())
        })?;
        let mut detector = Self::from_lines(&content).map_err(|e| {
            ContractError::device_unavailable(path.display().to_string(), e.to_string())
        })?;
        detector.name = format!("scripted:{}", path.display());
        info!(script = %path.display(), frames = detector.replies.len(), "loaded detector script");
        Ok(detector)
    }

    /// Parse script content directly
    pub fn from_lines(content: &str) -> Result<Self, ContractError> {
        let mut replies = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                replies.push(DetectorReply::Sets(Vec::new()));
                continue;
            }
            let reply = serde_json::from_str(line).map_err(|e| {
                ContractError::config_parse(format!("script line {}: {e}", line_no + 1))
            })?;
            replies.push(reply);
        }
        if replies.is_empty() {
            return Err(ContractError::config_parse("detector script is empty"));
        }
        Ok(Self {
            name: "scripted".to_string(),
            replies,
        })
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ContractError> {
        let idx = (frame.seq % self.replies.len() as u64) as usize;
        self.replies[idx].clone().into_result(&self.name)
    }
}
