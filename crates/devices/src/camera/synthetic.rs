//! Synthetic camera - 生成测试画面
//!
//! A dark background with a bright square that drifts across the frame,
//! enough to exercise mirroring, overlays and encoding without hardware.

use contracts::{unix_timestamp, CameraConfig, ContractError, Frame, FrameSource};
use tracing::{debug, info};

use super::Pacer;

const BACKGROUND: [u8; 3] = [24, 24, 32];
const MARKER: [u8; 3] = [230, 200, 40];

/// Generated frame source
pub struct SyntheticCamera {
    device_id: String,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    seq: u64,
    pacer: Pacer,
    closed: bool,
}

impl SyntheticCamera {
    pub fn open(config: &CameraConfig) -> Result<Self, ContractError> {
        if config.width == 0 || config.height == 0 {
            return Err(ContractError::device_unavailable(
                &config.device_id,
                "resolution must be non-zero",
            ));
        }
        info!(
            device_id = %config.device_id,
            width = config.width,
            height = config.height,
            fps = config.fps,
            "opened synthetic camera"
        );
        Ok(Self {
            device_id: config.device_id.clone(),
            width: config.width,
            height: config.height,
            frame_limit: config.frame_limit,
            seq: 0,
            pacer: Pacer::new(config.fps, config.throttle),
            closed: false,
        })
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::filled(
            self.seq,
            unix_timestamp(),
            self.width,
            self.height,
            BACKGROUND,
        );
        let side = (self.width.min(self.height) / 8).max(1);
        let travel = self.width.saturating_sub(side).max(1);
        let left = ((self.seq * 4) % u64::from(travel)) as u32;
        let top = self.height.saturating_sub(side) / 2;
        let stride = self.width as usize * 3;
        let pixels = frame.pixels_mut();
        for y in top..(top + side).min(self.height) {
            for x in left..(left + side).min(self.width) {
                let idx = y as usize * stride + x as usize * 3;
                pixels[idx..idx + 3].copy_from_slice(&MARKER);
            }
        }
        frame
    }
}

impl FrameSource for SyntheticCamera {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read(&mut self) -> Result<Option<Frame>, ContractError> {
        if self.closed {
            return Err(ContractError::stream_ended(&self.device_id));
        }
        if self.frame_limit.is_some_and(|limit| self.seq >= limit) {
            debug!(device_id = %self.device_id, frames = self.seq, "frame limit reached");
            return Ok(None);
        }
        self.pacer.wait();
        let frame = self.render();
        self.seq += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!(device_id = %self.device_id, frames = self.seq, "synthetic camera closed");
        }
    }
}
