//! Physical camera - OpenCV VideoCapture
//!
//! Opens a capture device by index, asks it for the configured resolution
//! and converts every BGR frame to RGB8 at exactly that size.

use contracts::{unix_timestamp, CameraConfig, ContractError, Frame, FrameSource};
use opencv::{
    core::{AlgorithmHint, Mat, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use tracing::{debug, info, warn};

use super::Pacer;

/// Live capture device
pub struct DeviceCamera {
    device_id: String,
    index: i32,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    capture: VideoCapture,
    seq: u64,
    pacer: Pacer,
    closed: bool,
}

impl DeviceCamera {
    /// Open the device at `config.index`
    ///
    /// # Errors
    /// `DeviceUnavailable` if no index is configured or the device does not open
    pub fn open(config: &CameraConfig) -> Result<Self, ContractError> {
        let unavailable = |message: String| ContractError::device_unavailable(&config.device_id, message);

        let index = config
            .index
            .ok_or_else(|| unavailable("no capture index configured".to_string()))?;

        let mut capture = VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|e| unavailable(format!("camera {index}: {e}")))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(unavailable(format!("camera {index} could not be opened")));
        }

        // 分辨率只是请求值，实际帧在 read 时统一缩放
        for (prop, value) in [
            (CAP_PROP_FRAME_WIDTH, f64::from(config.width)),
            (CAP_PROP_FRAME_HEIGHT, f64::from(config.height)),
            (CAP_PROP_BUFFERSIZE, 1.0),
        ] {
            if let Err(e) = capture.set(prop, value) {
                warn!(device_id = %config.device_id, prop, error = %e, "capture property rejected");
            }
        }

        info!(
            device_id = %config.device_id,
            index,
            width = config.width,
            height = config.height,
            "opened camera"
        );

        Ok(Self {
            device_id: config.device_id.clone(),
            index,
            width: config.width,
            height: config.height,
            frame_limit: config.frame_limit,
            capture,
            seq: 0,
            pacer: Pacer::new(config.fps, config.throttle),
            closed: false,
        })
    }

    fn grab(&mut self) -> Result<Vec<u8>, ContractError> {
        let transient = |e: opencv::Error| ContractError::transient_frame(&self.device_id, e.to_string());

        let mut bgr = Mat::default();
        let grabbed = self.capture.read(&mut bgr).map_err(transient)?;
        if !grabbed || bgr.empty() {
            return Err(ContractError::transient_frame(&self.device_id, "no frame delivered"));
        }

        let target = Size::new(self.width as i32, self.height as i32);
        let sized = if bgr.size().map_err(transient)? == target {
            bgr
        } else {
            let mut resized = Mat::default();
            imgproc::resize(&bgr, &mut resized, target, 0.0, 0.0, imgproc::INTER_LINEAR)
                .map_err(transient)?;
            resized
        };

        let mut rgb = Mat::default();
        imgproc::cvt_color(
            &sized,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(transient)?;

        Ok(rgb.data_bytes().map_err(transient)?.to_vec())
    }
}

impl FrameSource for DeviceCamera {
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
            return Ok(None);
        }
        self.pacer.wait();
        let pixels = self.grab()?;
        let frame = Frame::new(self.seq, unix_timestamp(), self.width, self.height, pixels);
        self.seq += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.capture.release() {
            warn!(device_id = %self.device_id, error = %e, "failed to release camera");
        }
        debug!(device_id = %self.device_id, index = self.index, frames = self.seq, "camera closed");
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_index_is_unavailable() {
        let mut config = CameraConfig::device("cam", 0, 64, 48);
        config.index = None;
        let err = DeviceCamera::open(&config).err().unwrap();
        assert!(matches!(err, ContractError::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_absent_device_is_unavailable() {
        let config = CameraConfig::device("cam", 4096, 64, 48);
        let err = DeviceCamera::open(&config).err().unwrap();
        assert!(err.is_fatal());
    }
}
