//! # Ingestion
//!
//! Frame capture and asynchronous landmark detection.
//!
//! Responsibilities:
//! - Wrap capture devices: mirroring, consecutive-failure counting
//! - Run one Landmark Worker thread per modality
//! - Backpressure through bounded channels with timed submit/collect
//! - Per-worker counters and `metrics` emission
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{CaptureDevice, LandmarkWorker, WorkerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let worker = LandmarkWorker::spawn(Modality::Hand, factory, WorkerConfig::default(), &cancel)?;
//!
//! let frame = capture.read()?;
//! worker.submit(frame.clone())?;
//! if let Some(result) = worker.recv_result()? {
//!     // result.frame is exactly the submitted frame
//! }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod worker;

pub use capture::CaptureDevice;
pub use config::{WorkerConfig, WorkerMetrics, WorkerMetricsSnapshot};
pub use error::{IngestionError, Result};
pub use worker::{LandmarkWorker, SubmitOutcome, WorkerState};
