//! Pipeline orchestrator - coordinates all components.
//!
//! One orchestrating thread drives the capture loop; each camera's frames go
//! to a dedicated Landmark Worker thread over bounded channels. Per tick:
//!
//! 1. read hand / face (/ side) frames
//! 2. submit them to the workers (a full input drops the frame)
//! 3. collect one result per worker (an empty output skips that modality)
//! 4. first hand → Gesture Interpreter → Sound Mapper; every hand → recorder
//! 5. face → orientation → recorder; annotated frames → session videos
//!
//! Shutdown always runs in the same order: cancel → clear channels → join
//! workers → flush recorder and audio → release cameras.

use std::mem;
use std::time::{Duration, Instant};

use contracts::{
    AudioBackend, ContractError, DetectionResult, Frame, Handedness, LandmarkSet, Modality,
    SessionBlueprint,
};
use devices::DeviceFactory;
use gesture::{face_orientation, hand_state, palm_up, DepthSource, SoundMapper};
use ingestion::{CaptureDevice, LandmarkWorker, SubmitOutcome, WorkerConfig};
use recorder::{draw_face, draw_hand, draw_palm_status, SessionRecorder, VideoStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{PipelineStats, StopReason};
use crate::error::Result;

/// Poll interval while collecting in-flight results after end of input
const SETTLE_POLL: Duration = Duration::from_millis(20);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The session blueprint (CLI overrides already applied)
    pub blueprint: SessionBlueprint,

    /// Maximum number of ticks (None = unlimited)
    pub max_frames: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,
}

impl PipelineConfig {
    /// Limits taken from the `[session]` section
    pub fn from_blueprint(blueprint: SessionBlueprint) -> Self {
        let max_frames = blueprint.session.max_frames;
        let timeout = blueprint
            .session
            .timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64);
        Self {
            blueprint,
            max_frames,
            timeout,
        }
    }
}

/// One worker per camera
struct Workers {
    hand: LandmarkWorker,
    face: LandmarkWorker,
    side: Option<LandmarkWorker>,
}

impl Workers {
    fn spawn(blueprint: &SessionBlueprint, with_side: bool, cancel: &CancellationToken) -> Result<Self> {
        let config = WorkerConfig::from(&blueprint.pipeline);
        let detectors = &blueprint.detectors;

        let hand = LandmarkWorker::spawn(
            Modality::Hand,
            DeviceFactory::detector_factory(&detectors.hand, Modality::Hand),
            config.clone(),
            cancel,
        )?;
        // 已启动的 worker 在 drop 时自行关闭
        let face = LandmarkWorker::spawn(
            Modality::Face,
            DeviceFactory::detector_factory(&detectors.face, Modality::Face),
            config.clone(),
            cancel,
        )?;
        let side = if with_side {
            Some(LandmarkWorker::spawn_named(
                "landmark-side".to_string(),
                Modality::Hand,
                DeviceFactory::detector_factory(&detectors.hand, Modality::Hand),
                config,
                cancel,
            )?)
        } else {
            None
        };

        Ok(Self { hand, face, side })
    }

    fn all(&self) -> impl Iterator<Item = &LandmarkWorker> {
        [Some(&self.hand), Some(&self.face), self.side.as_ref()]
            .into_iter()
            .flatten()
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut LandmarkWorker> {
        [Some(&mut self.hand), Some(&mut self.face), self.side.as_mut()]
            .into_iter()
            .flatten()
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
    hand_cam: CaptureDevice,
    face_cam: CaptureDevice,
    side_cam: Option<CaptureDevice>,
    workers: Workers,
    mapper: SoundMapper,
    recorder: SessionRecorder,
    /// Wait for each worker's result per tick
    result_timeout: Duration,
    /// Latest side-camera hand, kept between ticks
    latest_side: Option<LandmarkSet>,
    stats: PipelineStats,
}

impl Pipeline {
    /// Acquire every device, start the workers and open the session.
    ///
    /// Anything acquired before a failure is released again, so a failed
    /// start leaves no thread or device behind.
    #[instrument(name = "pipeline_start", skip_all)]
    pub fn start(
        config: PipelineConfig,
        backend: &dyn AudioBackend,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let blueprint = &config.blueprint;
        let cancel = cancel.child_token();
        let max_failures = blueprint.pipeline.max_consecutive_read_failures;

        let mut cameras = DeviceFactory::open_cameras(blueprint)?;

        let output = match DeviceFactory::open_audio(&blueprint.sound, backend) {
            Ok(output) => output,
            Err(e) => {
                cameras.close_all();
                return Err(e.into());
            }
        };
        let mapper = SoundMapper::new(blueprint.sound.clone(), output);

        let workers = match Workers::spawn(blueprint, cameras.side.is_some(), &cancel) {
            Ok(workers) => workers,
            Err(e) => {
                cameras.close_all();
                return Err(e);
            }
        };

        let recorder = match SessionRecorder::create(&blueprint.session.output_dir, blueprint.recorder.clone()) {
            Ok(recorder) => recorder,
            Err(e) => {
                cameras.close_all();
                return Err(e.into());
            }
        };

        let hand_cam = CaptureDevice::new(cameras.hand, max_failures);
        let face_cam = CaptureDevice::new(cameras.face, max_failures);
        let side_cam = cameras.side.map(|side| CaptureDevice::new(side, max_failures));

        info!(
            hand_cam = hand_cam.device_id(),
            face_cam = face_cam.device_id(),
            side_cam = side_cam.as_ref().map(|c| c.device_id()),
            session_dir = %recorder.session_dir().display(),
            "pipeline ready"
        );

        let result_timeout = Duration::from_millis(blueprint.pipeline.result_timeout_ms);
        let stats = PipelineStats {
            session_dir: recorder.session_dir().to_path_buf(),
            ..Default::default()
        };

        Ok(Self {
            config,
            cancel,
            hand_cam,
            face_cam,
            side_cam,
            workers,
            mapper,
            recorder,
            result_timeout,
            latest_side: None,
            stats,
        })
    }

    /// Token observed by the main loop and every worker
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until end of stream, a limit, cancellation or an unrecoverable
    /// error, then shut down.
    #[instrument(name = "pipeline_run", skip(self), fields(session_dir = %self.stats.session_dir.display()))]
    pub fn run(mut self) -> PipelineStats {
        let started = Instant::now();
        info!(
            max_frames = ?self.config.max_frames,
            timeout_secs = ?self.config.timeout.map(|t| t.as_secs_f64()),
            "pipeline running"
        );

        let reason = self.main_loop(started);
        info!(reason = %reason, ticks = self.stats.ticks, "main loop stopped");

        if reason.settles() {
            self.settle();
        }
        self.stats.stop_reason = reason;
        self.shutdown(started)
    }

    fn main_loop(&mut self, started: Instant) -> StopReason {
        loop {
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            if self.config.max_frames.is_some_and(|max| self.stats.ticks >= max) {
                return StopReason::FrameLimit;
            }
            if self.config.timeout.is_some_and(|limit| started.elapsed() >= limit) {
                return StopReason::Timeout;
            }
            if let Err(reason) = self.tick() {
                return reason;
            }
        }
    }

    fn tick(&mut self) -> std::result::Result<(), StopReason> {
        let tick_start = Instant::now();

        let hand_frame = read_camera(&mut self.hand_cam, &mut self.stats)?;
        let face_frame = read_camera(&mut self.face_cam, &mut self.stats)?;
        let side_frame = match self.side_cam.as_mut() {
            Some(cam) => read_camera(cam, &mut self.stats)?,
            None => None,
        };
        let (Some(hand_frame), Some(face_frame)) = (hand_frame, face_frame) else {
            return Ok(());
        };

        submit(&self.workers.hand, hand_frame, &mut self.stats)?;
        submit(&self.workers.face, face_frame, &mut self.stats)?;
        if let (Some(worker), Some(frame)) = (self.workers.side.as_ref(), side_frame) {
            submit(worker, frame, &mut self.stats)?;
        }
        self.stats.ticks += 1;

        if let Some(worker) = self.workers.side.as_ref() {
            if let Some(result) = collect(worker, self.result_timeout)? {
                self.latest_side = result.landmark_sets.into_iter().next();
            }
        }

        let hand = collect(&self.workers.hand, self.result_timeout)?;
        let hands = hand.as_ref().map(|r| r.landmark_sets.len());
        if let Some(result) = hand {
            self.process_hand(result);
        }

        let face = collect(&self.workers.face, self.result_timeout)?;
        let orientation = face.and_then(|result| self.process_face(result));

        let latency_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        observability::record_tick(latency_ms, hands);
        self.stats
            .tick_metrics
            .update_tick(latency_ms, hands, orientation.as_ref());
        for worker in self.workers.all() {
            observability::record_in_flight(worker.name(), worker.metrics().in_flight());
        }
        Ok(())
    }

    fn process_hand(&mut self, result: DetectionResult) {
        self.stats.hand_results += 1;
        let DetectionResult {
            landmark_sets: hands,
            frame,
            ..
        } = result;

        if hands.is_empty() {
            let released = self.mapper.hand_lost();
            if !released.is_empty() {
                debug!(seq = frame.seq, released = released.len(), "hand lost");
            }
        }

        for (index, hand) in hands.iter().enumerate() {
            if index == 0 {
                self.drive_sound(hand);
            }
            let handedness = hand.handedness().unwrap_or(Handedness::Right);
            let is_palm_up = palm_up(hand, handedness).unwrap_or_else(|| self.mapper.is_palm_up());
            self.recorder.record_hand_trajectory(hand, index, is_palm_up);
        }

        let frame = draw_hand(frame, &hands);
        let frame = draw_palm_status(frame, self.mapper.is_palm_up());
        self.recorder.write_video_frame(VideoStream::Hand, &frame);
    }

    /// The first hand plays: interpret it and update the sounding notes
    fn drive_sound(&mut self, hand: &LandmarkSet) {
        let depth_source = if self.workers.side.is_some() {
            DepthSource::SideCamera(self.latest_side.as_ref())
        } else {
            DepthSource::SingleCamera
        };
        let Some(state) = hand_state(hand, depth_source, &self.config.blueprint.gesture) else {
            return;
        };

        self.mapper.update_hand_orientation(&state);
        let notes = self.mapper.new_notes(state.x, state.y, None, None);
        let events = self.mapper.update_notes(&notes);
        if !events.is_empty() {
            debug!(
                x = state.x,
                y = state.y,
                depth = state.depth,
                palm_up = state.is_palm_up,
                events = events.len(),
                sounding = ?self.mapper.sounding(),
                "notes changed"
            );
        }
    }

    fn process_face(&mut self, result: DetectionResult) -> Option<contracts::FaceOrientation> {
        self.stats.face_results += 1;
        let DetectionResult {
            landmark_sets,
            frame,
            ..
        } = result;

        let (frame, orientation) = match landmark_sets.first() {
            Some(face) => {
                let orientation = face_orientation(face);
                self.recorder.record_face_orientation(orientation);
                observability::record_face_orientation(&orientation);
                (draw_face(frame, face), Some(orientation))
            }
            None => (frame, None),
        };
        self.recorder.write_video_frame(VideoStream::Face, &frame);
        orientation
    }

    /// Collect results of frames already submitted, bounded by the drain timeout
    fn settle(&mut self) {
        let drain_timeout = Duration::from_millis(self.config.blueprint.pipeline.drain_timeout_ms);
        let deadline = Instant::now() + drain_timeout;
        let mut collected = 0usize;

        while !self.workers.all().all(LandmarkWorker::is_settled) {
            if Instant::now() >= deadline {
                warn!(
                    drain_timeout_ms = drain_timeout.as_millis() as u64,
                    collected, "results still in flight after drain timeout"
                );
                return;
            }

            if let Some(worker) = self.workers.side.as_ref() {
                if let Ok(Some(result)) = collect(worker, Duration::ZERO) {
                    self.latest_side = result.landmark_sets.into_iter().next();
                }
            }
            match collect(&self.workers.hand, SETTLE_POLL) {
                Ok(Some(result)) => {
                    self.process_hand(result);
                    collected += 1;
                }
                Ok(None) => {}
                Err(_) => return,
            }
            match collect(&self.workers.face, SETTLE_POLL) {
                Ok(Some(result)) => {
                    self.process_face(result);
                    collected += 1;
                }
                Ok(None) => {}
                Err(_) => return,
            }
        }
        debug!(collected, "in-flight results collected");
    }

    #[instrument(name = "pipeline_shutdown", skip_all)]
    fn shutdown(mut self, started: Instant) -> PipelineStats {
        info!("Shutting down pipeline...");

        // 1. stop signal
        let stop_requested = Instant::now();
        self.cancel.cancel();

        // 2. drop whatever is still queued
        for worker in self.workers.all() {
            worker.clear();
        }

        // 3. join (bounded per worker)
        for worker in self.workers.all_mut() {
            if let Err(e) = worker.shutdown() {
                warn!(worker = worker.name(), error = %e, "worker shutdown incomplete");
            }
            let snapshot = worker.metrics();
            observability::record_in_flight(worker.name(), snapshot.in_flight());
            self.stats.workers.push((worker.name().to_string(), snapshot));
        }
        self.stats.worker_join = stop_requested.elapsed();
        debug!(join_ms = self.stats.worker_join.as_millis() as u64, "workers joined");

        // 4. flush recorder and audio
        let report = self.recorder.finalize();
        for path in &report.written {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown");
            observability::record_output_written(name, true);
        }
        for (name, reason) in &report.failed {
            error!(output = name, reason = %reason, "session output failed");
            observability::record_output_written(name, false);
            self.stats.tick_metrics.record_output_failure(name);
        }
        self.stats.outputs = report;

        self.mapper.end();
        self.stats.notes = self.mapper.counts();

        // 5. release capture devices
        self.hand_cam.close();
        self.face_cam.close();
        if let Some(cam) = self.side_cam.as_mut() {
            cam.close();
        }

        self.stats.duration = started.elapsed();
        info!(
            ticks = self.stats.ticks,
            duration_secs = self.stats.duration.as_secs_f64(),
            fps = format!("{:.2}", self.stats.fps()),
            note_on = self.stats.notes.note_on,
            note_off = self.stats.notes.note_off,
            "Pipeline shutdown complete"
        );
        mem::take(&mut self.stats)
    }
}

/// Read one frame. `Ok(None)` for a failed read that did not end the stream.
fn read_camera(
    camera: &mut CaptureDevice,
    stats: &mut PipelineStats,
) -> std::result::Result<Option<Frame>, StopReason> {
    match camera.read() {
        Ok(frame) => Ok(Some(frame)),
        Err(ContractError::StreamEnded { device }) => Err(StopReason::StreamEnded { device }),
        Err(e) => {
            stats.read_failures += 1;
            warn!(device_id = camera.device_id(), error = %e, "frame read failed, tick skipped");
            Ok(None)
        }
    }
}

fn submit(
    worker: &LandmarkWorker,
    frame: Frame,
    stats: &mut PipelineStats,
) -> std::result::Result<(), StopReason> {
    match worker.submit(frame) {
        Ok(SubmitOutcome::Queued) => Ok(()),
        Ok(SubmitOutcome::Dropped) => {
            stats.frames_dropped += 1;
            Ok(())
        }
        Err(e) => {
            error!(worker = worker.name(), error = %e, "worker unavailable");
            Err(StopReason::Failed {
                message: e.to_string(),
            })
        }
    }
}

fn collect(
    worker: &LandmarkWorker,
    timeout: Duration,
) -> std::result::Result<Option<DetectionResult>, StopReason> {
    worker.recv_result_timeout(timeout).map_err(|e| {
        error!(worker = worker.name(), error = %e, "worker output closed");
        StopReason::Failed {
            message: e.to_string(),
        }
    })
}
