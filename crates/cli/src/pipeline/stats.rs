//! Pipeline statistics and metrics.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use gesture::NoteCounts;
use ingestion::WorkerMetricsSnapshot;
use observability::PipelineMetricsAggregator;
use recorder::FinalizeReport;

/// Why the main loop stopped
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    /// A camera reported end of stream
    StreamEnded { device: String },
    /// `max_frames` ticks were run
    FrameLimit,
    /// The run timeout expired
    Timeout,
    /// Ctrl+C, SIGTERM or an external cancel
    #[default]
    Cancelled,
    /// A worker or output failed beyond recovery
    Failed { message: String },
}

impl StopReason {
    /// Normal end of input: results already submitted are collected first
    pub fn settles(&self) -> bool {
        matches!(self, Self::StreamEnded { .. } | Self::FrameLimit)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamEnded { device } => write!(f, "end of stream ({device})"),
            Self::FrameLimit => f.write_str("frame limit"),
            Self::Timeout => f.write_str("timeout"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Loop iterations that captured and submitted frames
    pub ticks: u64,

    /// Hand results processed
    pub hand_results: u64,

    /// Face results processed
    pub face_results: u64,

    /// Frames dropped on a full worker input
    pub frames_dropped: u64,

    /// Failed reads that did not end a stream
    pub read_failures: u64,

    pub stop_reason: StopReason,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Stop signal until the last worker was joined
    pub worker_join: Duration,

    pub session_dir: PathBuf,

    pub notes: NoteCounts,

    /// Final per-worker counters (hand, face, side)
    pub workers: Vec<(String, WorkerMetricsSnapshot)>,

    /// Files written by the recorder
    pub outputs: FinalizeReport,

    /// Tick metrics aggregator
    pub tick_metrics: PipelineMetricsAggregator,
}

impl PipelineStats {
    /// Ticks per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Dropped frames as a percentage of captured ones
    pub fn drop_rate(&self) -> f64 {
        let total = self.ticks + self.frames_dropped;
        if total > 0 {
            (self.frames_dropped as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Session Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks: {}", self.ticks);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   ├─ Frames dropped: {} ({:.2}%)", self.frames_dropped, self.drop_rate());
        println!("   ├─ Read failures: {}", self.read_failures);
        println!("   ├─ Worker join: {} ms", self.worker_join.as_millis());
        println!("   └─ Stopped by: {}", self.stop_reason);

        let summary = self.tick_metrics.summary();

        println!("\n📈 Landmarks");
        println!("   ├─ Hand results: {}", self.hand_results);
        println!("   ├─ Face results: {}", self.face_results);
        println!(
            "   ├─ Ticks with hands: {} ({:.2}%)",
            summary.hand_ticks, summary.hand_rate
        );
        println!("   ├─ Tick latency (ms): {}", summary.tick_latency_ms);
        println!("   ├─ Yaw (deg): {}", summary.yaw_deg);
        println!("   ├─ Pitch (deg): {}", summary.pitch_deg);
        println!("   └─ Roll (deg): {}", summary.roll_deg);

        println!("\n🎹 Sound");
        println!("   ├─ Note on: {}", self.notes.note_on);
        println!("   ├─ Note off: {}", self.notes.note_off);
        println!("   └─ Send failures: {}", self.notes.send_failures);

        if !self.workers.is_empty() {
            println!("\n⚙️  Workers");
            for (i, (name, snapshot)) in self.workers.iter().enumerate() {
                let prefix = if i == self.workers.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: completed={} dropped={} discarded={} failures={} panics={}",
                    prefix,
                    name,
                    snapshot.frames_completed,
                    snapshot.frames_dropped + snapshot.results_dropped,
                    snapshot.frames_discarded,
                    snapshot.failures,
                    snapshot.panics
                );
            }
        }

        println!("\n📁 Session: {}", self.session_dir.display());
        for path in &self.outputs.written {
            println!("   ├─ {}", path.display());
        }
        for name in &self.outputs.skipped {
            println!("   ├─ {} (skipped, no data)", name);
        }
        for (name, reason) in &self.outputs.failed {
            println!("   ├─ {} (failed: {})", name, reason);
        }

        println!();
    }
}
