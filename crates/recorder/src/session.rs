//! Session Recorder
//!
//! Owns the session directory, the two append-only telemetry logs and the
//! output video streams. Everything is flushed once by [`SessionRecorder::finalize`];
//! each output is best-effort and a failure only degrades that output.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use contracts::{
    hand_landmarks, unix_timestamp, FaceOrientation, FaceOrientationSample, Frame,
    HandTrajectorySample, LandmarkSet, RecorderConfig,
};
use tracing::{debug, error, info, instrument, warn};

use crate::animation::{save_trajectory_animation, AnimationSettings};
use crate::csv::{write_face_csv, write_hand_csv};
use crate::error::{RecorderError, Result};
use crate::plot::save_orientation_plot;
use crate::video::VideoEncoder;

pub const FACE_CSV: &str = "face_orientation.csv";
pub const HAND_CSV: &str = "hand_trajectories.csv";
pub const FACE_PLOT: &str = "face_orientation_plot.png";
pub const HAND_ANIMATION: &str = "hand_trajectory_3d.gif";
pub const HAND_VIDEO: &str = "hand_tracking_video.y4m";
pub const FACE_VIDEO: &str = "face_tracking_video.y4m";

/// Output video streams of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VideoStream {
    Hand,
    Face,
}

impl VideoStream {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Hand => HAND_VIDEO,
            Self::Face => FACE_VIDEO,
        }
    }
}

impl fmt::Display for VideoStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hand => f.write_str("hand"),
            Self::Face => f.write_str("face"),
        }
    }
}

/// What `finalize` produced
#[derive(Debug, Clone, Default)]
pub struct FinalizeReport {
    pub written: Vec<PathBuf>,
    /// Outputs skipped for lack of data
    pub skipped: Vec<&'static str>,
    /// Outputs that failed, with the reason
    pub failed: Vec<(&'static str, String)>,
}

impl FinalizeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum StreamSlot {
    Open(VideoEncoder),
    /// Gave up after an error; later frames are ignored
    Failed,
}

/// In-memory session logs plus their on-disk destination
pub struct SessionRecorder {
    config: RecorderConfig,
    session_dir: PathBuf,
    started_at: DateTime<Local>,
    face: Vec<FaceOrientationSample>,
    hands: BTreeMap<usize, Vec<HandTrajectorySample>>,
    videos: BTreeMap<VideoStream, StreamSlot>,
    finalized: bool,
}

impl SessionRecorder {
    /// Create `<output_dir>/<%Y%m%d_%H%M%S>` and an empty session
    #[instrument(name = "session_recorder_create", skip(config), fields(output_dir = %output_dir.display()))]
    pub fn create(output_dir: &Path, config: RecorderConfig) -> Result<Self> {
        let started_at = Local::now();
        let session_dir = unique_session_dir(output_dir, &started_at);
        fs::create_dir_all(&session_dir).map_err(|source| RecorderError::SessionDir {
            path: session_dir.display().to_string(),
            source,
        })?;
        info!(session_dir = %session_dir.display(), "session started");

        Ok(Self {
            config,
            session_dir,
            started_at,
            face: Vec::new(),
            hands: BTreeMap::new(),
            videos: BTreeMap::new(),
            finalized: false,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn face_samples(&self) -> &[FaceOrientationSample] {
        &self.face
    }

    pub fn hand_samples(&self) -> &BTreeMap<usize, Vec<HandTrajectorySample>> {
        &self.hands
    }

    /// Samples recorded for one hand index
    pub fn trajectory_len(&self, hand_index: usize) -> usize {
        self.hands.get(&hand_index).map_or(0, Vec::len)
    }

    /// Append the middle-finger base of one detected hand.
    ///
    /// Returns false (and logs) when the set lacks that landmark.
    pub fn record_hand_trajectory(
        &mut self,
        landmarks: &LandmarkSet,
        hand_index: usize,
        is_palm_up: bool,
    ) -> bool {
        self.record_hand_trajectory_at(unix_timestamp(), landmarks, hand_index, is_palm_up)
    }

    pub fn record_hand_trajectory_at(
        &mut self,
        timestamp: f64,
        landmarks: &LandmarkSet,
        hand_index: usize,
        is_palm_up: bool,
    ) -> bool {
        let Some(base) = landmarks.get(hand_landmarks::MIDDLE_FINGER_MCP) else {
            warn!(hand_index, landmarks = landmarks.len(), "hand sample without landmark 9 dropped");
            return false;
        };
        self.hands.entry(hand_index).or_default().push(HandTrajectorySample {
            timestamp,
            x: base.x,
            y: base.y,
            z: base.z,
            is_palm_up,
        });
        true
    }

    pub fn record_face_orientation(&mut self, orientation: FaceOrientation) {
        self.record_face_orientation_at(unix_timestamp(), orientation);
    }

    pub fn record_face_orientation_at(&mut self, timestamp: f64, orientation: FaceOrientation) {
        self.face.push(FaceOrientationSample::new(timestamp, orientation));
    }

    /// Append a frame to a session video, opening the stream at the frame's
    /// size on first use.
    ///
    /// A stream that fails is logged once and disabled.
    pub fn write_video_frame(&mut self, stream: VideoStream, frame: &Frame) {
        if !self.config.write_videos || self.finalized {
            return;
        }

        if !self.videos.contains_key(&stream) {
            let path = self.session_dir.join(stream.file_name());
            let slot = match VideoEncoder::create(&path, frame.width(), frame.height(), self.config.video_fps) {
                Ok(encoder) => StreamSlot::Open(encoder),
                Err(e) => {
                    error!(stream = %stream, error = %e, "video stream unavailable");
                    StreamSlot::Failed
                }
            };
            self.videos.insert(stream, slot);
        }

        if let Some(slot) = self.videos.get_mut(&stream) {
            if let StreamSlot::Open(encoder) = slot {
                if let Err(e) = encoder.write_frame(frame) {
                    error!(stream = %stream, seq = frame.seq, error = %e, "video write failed, stream disabled");
                    *slot = StreamSlot::Failed;
                }
            }
        }
    }

    /// Frames written to a stream so far
    pub fn video_frames(&self, stream: VideoStream) -> u64 {
        match self.videos.get(&stream) {
            Some(StreamSlot::Open(encoder)) => encoder.frames_written(),
            _ => 0,
        }
    }

    /// Persist logs, render the plot and animation, close the videos.
    ///
    /// Runs once; later calls return an empty report.
    #[instrument(name = "session_recorder_finalize", skip(self), fields(session_dir = %self.session_dir.display()))]
    pub fn finalize(&mut self) -> FinalizeReport {
        let mut report = FinalizeReport::default();
        if self.finalized {
            debug!("session already finalized");
            return report;
        }
        self.finalized = true;

        for (stream, slot) in std::mem::take(&mut self.videos) {
            if let StreamSlot::Open(mut encoder) = slot {
                let path = encoder.path().to_path_buf();
                match encoder.finish() {
                    Ok(()) => report.written.push(path),
                    Err(e) => {
                        let e = e.into_contract(stream.file_name());
                        error!(stream = %stream, error = %e, "video finish failed");
                        report.failed.push((stream.file_name(), e.to_string()));
                    }
                }
            }
        }

        let dir = self.session_dir.clone();
        let face = &self.face;
        let hands = &self.hands;

        run_output(&mut report, &dir, FACE_CSV, face.is_empty(), || {
            write_face_csv(&dir.join(FACE_CSV), face)?;
            Ok(())
        });
        run_output(&mut report, &dir, HAND_CSV, hands.is_empty(), || {
            write_hand_csv(&dir.join(HAND_CSV), hands)?;
            Ok(())
        });
        run_output(&mut report, &dir, FACE_PLOT, face.is_empty(), || {
            save_orientation_plot(
                &dir.join(FACE_PLOT),
                face,
                self.config.plot_width,
                self.config.plot_height,
            )
        });
        let settings = AnimationSettings {
            size: self.config.animation_size,
            fps: self.config.animation_fps,
            trail_length: self.config.trail_length,
            max_frames: self.config.max_animation_frames,
        };
        run_output(&mut report, &dir, HAND_ANIMATION, hands.is_empty(), || {
            save_trajectory_animation(&dir.join(HAND_ANIMATION), hands, &settings).map(|_| ())
        });

        info!(
            written = report.written.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            face_samples = self.face.len(),
            hands = self.hands.len(),
            "session finalized"
        );
        report
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(session_dir = %self.session_dir.display(), "session dropped before finalize, flushing");
            self.finalize();
        }
    }
}

fn run_output(
    report: &mut FinalizeReport,
    dir: &Path,
    name: &'static str,
    empty: bool,
    write: impl FnOnce() -> Result<()>,
) {
    if empty {
        warn!(output = name, "no data, output skipped");
        report.skipped.push(name);
        return;
    }
    match write() {
        Ok(()) => {
            info!(output = name, "output written");
            report.written.push(dir.join(name));
        }
        Err(e) => {
            let e = e.into_contract(name);
            error!(output = name, error = %e, "output failed");
            report.failed.push((name, e.to_string()));
        }
    }
}

/// `<output_dir>/<timestamp>`, suffixed when a session started in the same second
fn unique_session_dir(output_dir: &Path, started_at: &DateTime<Local>) -> PathBuf {
    let stamp = started_at.format("%Y%m%d_%H%M%S").to_string();
    let base = output_dir.join(&stamp);
    if !base.exists() {
        return base;
    }
    (2..)
        .map(|n| output_dir.join(format!("{stamp}_{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Landmark;

    fn small_config() -> RecorderConfig {
        RecorderConfig {
            plot_width: 200,
            plot_height: 240,
            animation_size: 48,
            ..RecorderConfig::default()
        }
    }

    fn hand_at(x: f32, y: f32) -> LandmarkSet {
        let mut points = vec![Landmark::default(); hand_landmarks::COUNT];
        points[hand_landmarks::MIDDLE_FINGER_MCP] = Landmark::new(x, y, -0.03);
        LandmarkSet::new(points, None)
    }

    #[test]
    fn test_session_dir_named_by_start_time() {
        let out = tempfile::tempdir().unwrap();
        let first = SessionRecorder::create(out.path(), small_config()).unwrap();
        let name = first.session_dir().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name.len(), "20240101_120000".len());
        assert_eq!(&name[8..9], "_");

        // same second: still a fresh directory
        let second = SessionRecorder::create(out.path(), small_config()).unwrap();
        assert_ne!(first.session_dir(), second.session_dir());
    }

    #[test]
    fn test_per_hand_logs() {
        let out = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::create(out.path(), small_config()).unwrap();
        assert!(recorder.record_hand_trajectory_at(1.0, &hand_at(0.5, 0.5), 0, true));
        assert!(recorder.record_hand_trajectory_at(1.1, &hand_at(0.4, 0.5), 1, false));
        assert!(recorder.record_hand_trajectory_at(1.2, &hand_at(0.6, 0.5), 0, false));
        assert!(!recorder.record_hand_trajectory(&LandmarkSet::new(vec![], None), 0, true));

        assert_eq!(recorder.trajectory_len(0), 2);
        assert_eq!(recorder.trajectory_len(1), 1);
        let first = recorder.hand_samples()[&0][0];
        assert_eq!((first.x, first.z, first.is_palm_up), (0.5, -0.03, true));
    }

    #[test]
    fn test_finalize_writes_all_outputs() {
        let out = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::create(out.path(), small_config()).unwrap();
        for i in 0..10u32 {
            let t = 100.0 + f64::from(i) * 0.05;
            recorder.record_hand_trajectory_at(t, &hand_at(0.3 + 0.02 * i as f32, 0.5), 0, true);
            recorder.record_face_orientation_at(
                t,
                FaceOrientation {
                    yaw: f64::from(i),
                    pitch: 0.0,
                    roll: -1.0,
                },
            );
            recorder.write_video_frame(VideoStream::Hand, &Frame::filled(i.into(), t, 8, 6, [9, 9, 9]));
            recorder.write_video_frame(VideoStream::Face, &Frame::filled(i.into(), t, 4, 4, [9, 9, 9]));
        }
        assert_eq!(recorder.video_frames(VideoStream::Hand), 10);

        let report = recorder.finalize();
        assert!(report.is_clean(), "{:?}", report.failed);
        assert!(report.skipped.is_empty());

        let dir = recorder.session_dir().to_path_buf();
        for name in [FACE_CSV, HAND_CSV, FACE_PLOT, HAND_ANIMATION, HAND_VIDEO, FACE_VIDEO] {
            assert!(dir.join(name).is_file(), "missing {name}");
        }
        let csv = fs::read_to_string(dir.join(HAND_CSV)).unwrap();
        assert_eq!(csv.lines().count(), 11);

        assert!(recorder.finalize().written.is_empty());
    }

    #[test]
    fn test_empty_log_skipped_others_written() {
        let out = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::create(out.path(), small_config()).unwrap();
        recorder.record_face_orientation_at(5.0, FaceOrientation::ZERO);

        let report = recorder.finalize();
        assert!(report.is_clean());
        assert_eq!(report.skipped, vec![HAND_CSV, HAND_ANIMATION]);

        let dir = recorder.session_dir();
        assert!(dir.join(FACE_CSV).is_file());
        assert!(dir.join(FACE_PLOT).is_file());
        assert!(!dir.join(HAND_CSV).exists());
        assert!(!dir.join(HAND_ANIMATION).exists());
    }

    #[test]
    fn test_mismatched_frame_disables_stream_only() {
        let out = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::create(out.path(), small_config()).unwrap();
        recorder.write_video_frame(VideoStream::Face, &Frame::filled(0, 0.0, 4, 4, [0, 0, 0]));
        recorder.write_video_frame(VideoStream::Face, &Frame::filled(1, 0.0, 8, 8, [0, 0, 0]));
        recorder.write_video_frame(VideoStream::Hand, &Frame::filled(0, 0.0, 4, 4, [0, 0, 0]));
        assert_eq!(recorder.video_frames(VideoStream::Face), 0);
        assert_eq!(recorder.video_frames(VideoStream::Hand), 1);
    }

    #[test]
    fn test_videos_disabled_by_config() {
        let out = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            write_videos: false,
            ..small_config()
        };
        let mut recorder = SessionRecorder::create(out.path(), config).unwrap();
        recorder.write_video_frame(VideoStream::Hand, &Frame::filled(0, 0.0, 4, 4, [0, 0, 0]));
        recorder.finalize();
        assert!(!recorder.session_dir().join(HAND_VIDEO).exists());
    }
}
