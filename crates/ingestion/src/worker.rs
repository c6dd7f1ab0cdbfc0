//! Landmark Worker
//!
//! One dedicated OS thread per modality. Frames arrive on a bounded input
//! channel, detection runs synchronously on the worker thread, and each
//! `DetectionResult` leaves on a bounded output channel.
//!
//! ```text
//! Idle ──spawn──▶ Running ──cancel──▶ Draining ──detector closed──▶ Stopped
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{ContractError, DetectionResult, DetectorFactory, Frame, LandmarkDetector, Modality};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::{WorkerConfig, WorkerMetrics, WorkerMetricsSnapshot};
use crate::error::{IngestionError, Result};

/// Worker lifecycle state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Outcome of [`LandmarkWorker::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// Input channel stayed full past the submit timeout
    Dropped,
}

/// Handle to a running Landmark Worker
pub struct LandmarkWorker {
    name: String,
    modality: Modality,
    config: WorkerConfig,
    input_tx: Sender<Option<Frame>>,
    input_rx: Receiver<Option<Frame>>,
    output_rx: Receiver<DetectionResult>,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
    metrics: Arc<WorkerMetrics>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl LandmarkWorker {
    /// Start a worker thread and open its detector on that thread.
    ///
    /// Returns once the detector is ready, so a model that cannot be opened
    /// fails here, before any frame is captured.
    ///
    /// The worker observes a child of `cancel`: cancelling the parent stops
    /// every worker, shutting one worker down leaves the others running.
    pub fn spawn(
        modality: Modality,
        factory: DetectorFactory,
        config: WorkerConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        Self::spawn_named(format!("landmark-{modality}"), modality, factory, config, cancel)
    }

    /// Like [`spawn`](Self::spawn) with an explicit thread name, for a
    /// second worker of the same modality (the side camera).
    #[instrument(name = "landmark_worker_spawn", skip(factory, config, cancel), fields(modality = %modality))]
    pub fn spawn_named(
        name: String,
        modality: Modality,
        factory: DetectorFactory,
        config: WorkerConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let (input_tx, input_rx) = bounded::<Option<Frame>>(config.queue_depth);
        let (output_tx, output_rx) = bounded::<DetectionResult>(config.queue_depth);
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), ContractError>>(1);
        let (done_tx, done_rx) = bounded::<()>(1);

        let cancel = cancel.child_token();
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let metrics = Arc::new(WorkerMetrics::new());

        let worker_loop = WorkerLoop {
            name: name.clone(),
            modality,
            input: input_rx.clone(),
            output: output_tx,
            cancel: cancel.clone(),
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            poll_interval: config.poll_interval,
            output_timeout: config.output_timeout,
        };

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _completion = CompletionSignal {
                    done: done_tx,
                    state: Arc::clone(&worker_loop.state),
                };
                let detector = match factory() {
                    Ok(detector) => detector,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let mut guard = DetectorGuard {
                    detector,
                    worker: worker_loop.name.clone(),
                };
                worker_loop.set_state(WorkerState::Running);
                let _ = ready_tx.send(Ok(()));
                worker_loop.run(guard.detector.as_mut());
            })
            .map_err(|e| IngestionError::SpawnFailed {
                worker: name.clone(),
                message: e.to_string(),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(worker = %name, queue_depth = config.queue_depth, "landmark worker started");
                Ok(Self {
                    name,
                    modality,
                    config,
                    input_tx,
                    input_rx,
                    output_rx,
                    cancel,
                    state,
                    metrics,
                    done_rx,
                    handle: Some(handle),
                })
            }
            Ok(Err(source)) => {
                let _ = handle.join();
                Err(IngestionError::DetectorInit {
                    worker: name,
                    source,
                })
            }
            Err(_) => {
                let _ = handle.join();
                Err(IngestionError::SpawnFailed {
                    worker: name,
                    message: "worker exited during startup".to_string(),
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn metrics(&self) -> WorkerMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Queue a frame, waiting up to the submit timeout on a full channel.
    ///
    /// The frame is moved into the worker; callers keeping the frame
    /// submit a clone.
    pub fn submit(&self, frame: Frame) -> Result<SubmitOutcome> {
        if self.state() != WorkerState::Running {
            return Err(IngestionError::NotRunning {
                worker: self.name.clone(),
            });
        }

        let seq = frame.seq;
        match self.input_tx.send_timeout(Some(frame), self.config.submit_timeout) {
            Ok(()) => {
                self.metrics.record_submitted();
                metrics::gauge!("handsynth_queue_depth", "modality" => self.modality.as_str())
                    .set(self.input_tx.len() as f64);
                Ok(SubmitOutcome::Queued)
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.metrics.record_dropped();
                metrics::counter!("handsynth_frames_dropped_total", "modality" => self.modality.as_str(), "stage" => "submit")
                    .increment(1);
                debug!(worker = %self.name, seq, "input channel full, frame dropped");
                Ok(SubmitOutcome::Dropped)
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(IngestionError::ChannelClosed {
                worker: self.name.clone(),
            }),
        }
    }

    /// Next result, waiting up to the configured result timeout
    pub fn recv_result(&self) -> Result<Option<DetectionResult>> {
        self.recv_result_timeout(self.config.result_timeout)
    }

    /// Next result, waiting up to `timeout`. `Ok(None)` on expiry.
    pub fn recv_result_timeout(&self, timeout: Duration) -> Result<Option<DetectionResult>> {
        match self.output_rx.recv_timeout(timeout) {
            Ok(result) => Ok(Some(result)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(IngestionError::ChannelClosed {
                worker: self.name.clone(),
            }),
        }
    }

    /// Every submitted frame has been processed and collected
    pub fn is_settled(&self) -> bool {
        self.metrics.snapshot().in_flight() == 0 && self.output_rx.is_empty()
    }

    /// Discard queued inputs and uncollected results.
    ///
    /// Returns the number of frames discarded from the input channel.
    pub fn clear(&self) -> usize {
        let inputs = self.input_rx.try_iter().flatten().count();
        self.metrics.record_discarded(inputs as u64);
        let outputs = self.output_rx.try_iter().count();
        if inputs + outputs > 0 {
            debug!(worker = %self.name, inputs, outputs, "channels cleared");
        }
        inputs
    }

    /// Stop the worker: cancel, clear the channels, wake the thread and
    /// join it within the configured join timeout.
    ///
    /// A worker that does not stop in time is detached. Idempotent.
    #[instrument(name = "landmark_worker_shutdown", skip(self), fields(worker = %self.name))]
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.cancel.cancel();
        let cleared = self.clear();
        // 唤醒阻塞在输入通道上的线程
        let _ = self.input_tx.try_send(None);

        match self.done_rx.recv_timeout(self.config.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!(worker = %self.name, "worker thread panicked");
                }
                let snapshot = self.metrics.snapshot();
                info!(
                    worker = %self.name,
                    cleared,
                    completed = snapshot.frames_completed,
                    failures = snapshot.failures,
                    panics = snapshot.panics,
                    "landmark worker stopped"
                );
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                let timeout_ms = self.config.join_timeout.as_millis() as u64;
                warn!(worker = %self.name, timeout_ms, "worker did not stop in time, detaching");
                drop(handle);
                Err(IngestionError::JoinTimeout {
                    worker: self.name.clone(),
                    timeout_ms,
                })
            }
        }
    }
}

impl Drop for LandmarkWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(worker = %self.name, error = %e, "worker shutdown on drop failed");
        }
    }
}

/// State owned by the worker thread
struct WorkerLoop {
    name: String,
    modality: Modality,
    input: Receiver<Option<Frame>>,
    output: Sender<DetectionResult>,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
    metrics: Arc<WorkerMetrics>,
    poll_interval: Duration,
    output_timeout: Duration,
}

impl WorkerLoop {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn run(&self, detector: &mut dyn LandmarkDetector) {
        debug!(worker = %self.name, detector = detector.name(), "worker loop running");

        while !self.cancel.is_cancelled() {
            match self.input.recv_timeout(self.poll_interval) {
                Ok(Some(frame)) => {
                    self.process(detector, frame);
                    self.metrics.record_completed();
                }
                Ok(None) => self.metrics.record_sentinel(),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(worker = %self.name, "input channel closed");
                    break;
                }
            }
        }

        self.set_state(WorkerState::Draining);
        debug!(worker = %self.name, "worker loop draining");
    }

    fn process(&self, detector: &mut dyn LandmarkDetector, frame: Frame) {
        if frame.is_empty() {
            self.metrics.record_sentinel();
            trace!(worker = %self.name, seq = frame.seq, "empty frame ignored");
            return;
        }

        if !frame.is_well_formed() {
            self.metrics.record_failure();
            metrics::counter!("handsynth_detection_failures_total", "modality" => self.modality.as_str(), "kind" => "malformed")
                .increment(1);
            warn!(
                worker = %self.name,
                seq = frame.seq,
                width = frame.width(),
                height = frame.height(),
                len = frame.pixels().len(),
                "malformed frame skipped"
            );
            return;
        }

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&frame)));
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(Ok(landmark_sets)) => {
                metrics::counter!("handsynth_detections_total", "modality" => self.modality.as_str())
                    .increment(1);
                metrics::histogram!("handsynth_detection_latency_ms", "modality" => self.modality.as_str())
                    .record(latency_ms);
                trace!(
                    worker = %self.name,
                    seq = frame.seq,
                    sets = landmark_sets.len(),
                    latency_ms,
                    "frame processed"
                );
                self.emit(DetectionResult {
                    modality: self.modality,
                    landmark_sets,
                    frame,
                });
            }
            Ok(Err(e)) => {
                self.metrics.record_failure();
                metrics::counter!("handsynth_detection_failures_total", "modality" => self.modality.as_str(), "kind" => "error")
                    .increment(1);
                warn!(worker = %self.name, seq = frame.seq, error = %e, "detection failed, frame skipped");
            }
            Err(payload) => {
                self.metrics.record_panic();
                metrics::counter!("handsynth_detection_failures_total", "modality" => self.modality.as_str(), "kind" => "panic")
                    .increment(1);
                error!(
                    worker = %self.name,
                    seq = frame.seq,
                    panic = %panic_message(payload.as_ref()),
                    "detector panicked, frame skipped"
                );
            }
        }
    }

    fn emit(&self, result: DetectionResult) {
        match self.output.send_timeout(result, self.output_timeout) {
            Ok(()) => self.metrics.record_emitted(),
            Err(SendTimeoutError::Timeout(result)) => {
                self.metrics.record_result_dropped();
                metrics::counter!("handsynth_frames_dropped_total", "modality" => self.modality.as_str(), "stage" => "output")
                    .increment(1);
                warn!(worker = %self.name, seq = result.frame.seq, "output channel full, result dropped");
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                debug!(worker = %self.name, "output channel closed, result discarded");
            }
        }
    }
}

/// Closes the detector when the worker thread leaves, unwinding included
struct DetectorGuard {
    detector: Box<dyn LandmarkDetector>,
    worker: String,
}

impl Drop for DetectorGuard {
    fn drop(&mut self) {
        self.detector.close();
        debug!(worker = %self.worker, detector = self.detector.name(), "detector closed");
    }
}

/// Marks the worker stopped and signals completion; runs last
struct CompletionSignal {
    done: Sender<()>,
    state: Arc<AtomicU8>,
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        self.state.store(WorkerState::Stopped as u8, Ordering::Release);
        let _ = self.done.try_send(());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
