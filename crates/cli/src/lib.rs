//! # handsynth CLI library
//!
//! 管道编排：采集 → landmark worker → 手势解释 / 发声 → 会话记录。
//! The `handsynth` binary is a thin clap layer over [`pipeline::Pipeline`].

pub mod error;
pub mod pipeline;

pub use error::CliError;
pub use pipeline::{Pipeline, PipelineConfig, PipelineStats, StopReason};
