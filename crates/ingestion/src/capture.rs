//! 采集设备包装
//!
//! 在 `FrameSource` 之上统一处理：
//! - 水平镜像（下游看到的都是镜像后的画面）
//! - 连续读取失败计数，达到上限视为流结束

use contracts::{ContractError, Frame, FrameSource};
use tracing::{debug, warn};

/// Mirrored, failure-counting view of a capture device
pub struct CaptureDevice {
    source: Box<dyn FrameSource>,
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    frames_read: u64,
    read_failures: u64,
}

impl CaptureDevice {
    pub fn new(source: Box<dyn FrameSource>, max_consecutive_failures: u32) -> Self {
        Self {
            source,
            max_consecutive_failures: max_consecutive_failures.max(1),
            consecutive_failures: 0,
            frames_read: 0,
            read_failures: 0,
        }
    }

    pub fn device_id(&self) -> &str {
        self.source.device_id()
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.source.resolution()
    }

    /// Read the next mirrored frame.
    ///
    /// # Errors
    /// - `StreamEnded` at end of stream, or once reads fail
    ///   `max_consecutive_failures` times in a row
    /// - `TransientFrame` for an isolated failed read
    pub fn read(&mut self) -> Result<Frame, ContractError> {
        match self.source.read() {
            Ok(Some(mut frame)) => {
                self.consecutive_failures = 0;
                self.frames_read += 1;
                frame.mirror_horizontal();
                metrics::counter!("handsynth_frames_captured_total", "device" => self.source.device_id().to_string())
                    .increment(1);
                Ok(frame)
            }
            Ok(None) => {
                debug!(device = %self.device_id(), "end of stream");
                Err(ContractError::stream_ended(self.device_id()))
            }
            Err(e @ ContractError::StreamEnded { .. }) => Err(e),
            Err(e) => {
                self.consecutive_failures += 1;
                self.read_failures += 1;
                warn!(
                    device = %self.device_id(),
                    error = %e,
                    consecutive = self.consecutive_failures,
                    "frame read failed"
                );
                if self.consecutive_failures >= self.max_consecutive_failures {
                    Err(ContractError::stream_ended(self.device_id()))
                } else {
                    Err(ContractError::transient_frame(self.device_id(), e.to_string()))
                }
            }
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn read_failures(&self) -> u64 {
        self.read_failures
    }

    /// Release the device (idempotent)
    pub fn close(&mut self) {
        self.source.close();
    }
}
