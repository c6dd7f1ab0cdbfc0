//! Session Recorder
//!
//! 会话记录: keeps the per-session telemetry logs and turns them into
//! files when the session ends.
//!
//! Session directory layout:
//!
//! ```text
//! <output_dir>/<YYYYmmdd_HHMMSS>/
//!     face_orientation.csv
//!     hand_trajectories.csv
//!     face_orientation_plot.png
//!     hand_trajectory_3d.gif
//!     hand_tracking_video.y4m
//!     face_tracking_video.y4m
//! ```
//!
//! Also hosts the frame overlays (hand skeleton, palm status, face points)
//! drawn before frames are written to the videos.

pub mod animation;
pub mod csv;
mod draw;
pub mod error;
pub mod overlay;
pub mod plot;
pub mod session;
pub mod video;

pub use animation::{merge_by_timestamp, save_trajectory_animation, AnimationSettings};
pub use error::{RecorderError, Result};
pub use overlay::{draw_face, draw_hand, draw_palm_status};
pub use session::{FinalizeReport, SessionRecorder, VideoStream};
pub use video::VideoEncoder;
