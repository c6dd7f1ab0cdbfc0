//! LandmarkDetector trait - landmark model abstraction

use crate::{ContractError, Frame, LandmarkSet};

/// Landmark detection model
///
/// Opened once per worker and used only from that worker's thread.
pub trait LandmarkDetector: Send {
    /// Model name (used in logs)
    fn name(&self) -> &str;

    /// Detect zero or more landmark sets in `frame`.
    ///
    /// # Errors
    /// A failure for this frame only; the caller skips the frame and keeps going.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ContractError>;

    /// Release model resources. Called exactly once at worker shutdown.
    fn close(&mut self) {}
}

/// Deferred detector construction, run on the worker thread itself
pub type DetectorFactory =
    Box<dyn FnOnce() -> Result<Box<dyn LandmarkDetector>, ContractError> + Send>;
