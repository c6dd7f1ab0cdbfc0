//! Worker configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::PipelineSettings;

/// Landmark Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Capacity of the input and output channels
    pub queue_depth: usize,

    /// How long `submit` waits on a full input channel
    pub submit_timeout: Duration,

    /// How long `recv_result` waits on an empty output channel
    pub result_timeout: Duration,

    /// Worker-side input poll; the stop signal is re-checked on expiry
    pub poll_interval: Duration,

    /// How long the worker waits on a full output channel before dropping
    pub output_timeout: Duration,

    /// How long `shutdown` waits for the thread to exit
    pub join_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for WorkerConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            queue_depth: settings.queue_depth.max(1),
            submit_timeout: Duration::from_millis(settings.submit_timeout_ms),
            result_timeout: Duration::from_millis(settings.result_timeout_ms),
            poll_interval: Duration::from_millis(settings.worker_poll_ms),
            output_timeout: Duration::from_millis(settings.worker_output_timeout_ms),
            join_timeout: Duration::from_millis(settings.join_timeout_ms),
        }
    }
}

/// Per-worker counters
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Frames accepted into the input channel
    pub frames_submitted: AtomicU64,

    /// Frames dropped because the input channel stayed full
    pub frames_dropped: AtomicU64,

    /// Frames the worker finished with (result, failure or skip)
    pub frames_completed: AtomicU64,

    /// Queued frames thrown away by `clear` before the worker saw them
    pub frames_discarded: AtomicU64,

    /// Results pushed to the output channel
    pub results_emitted: AtomicU64,

    /// Results dropped because the output channel stayed full
    pub results_dropped: AtomicU64,

    /// Detection errors, including malformed frames
    pub failures: AtomicU64,

    /// Detection panics
    pub panics: AtomicU64,

    /// Sentinel inputs ignored
    pub sentinels: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.frames_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.results_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result_dropped(&self) {
        self.results_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sentinel(&self) {
        self.sentinels.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> WorkerMetricsSnapshot {
        WorkerMetricsSnapshot {
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            results_dropped: self.results_dropped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            sentinels: self.sentinels.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerMetricsSnapshot {
    pub frames_submitted: u64,
    pub frames_dropped: u64,
    pub frames_completed: u64,
    pub frames_discarded: u64,
    pub results_emitted: u64,
    pub results_dropped: u64,
    pub failures: u64,
    pub panics: u64,
    pub sentinels: u64,
}

impl WorkerMetricsSnapshot {
    /// Submitted frames neither finished nor discarded
    pub fn in_flight(&self) -> u64 {
        self.frames_submitted
            .saturating_sub(self.frames_completed)
            .saturating_sub(self.frames_discarded)
    }
}
