//! Image sequence camera - 从图片目录回放画面
//!
//! Reads every still image in a directory (sorted by file name), decodes it
//! to RGB8 and resizes it to the configured resolution.

use std::path::{Path, PathBuf};

use contracts::{unix_timestamp, CameraConfig, ContractError, Frame, FrameSource};
use image::imageops::FilterType;
use tracing::{debug, info, warn};

use super::Pacer;

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Replays a directory of images as a capture stream
pub struct ImageSequenceCamera {
    device_id: String,
    width: u32,
    height: u32,
    files: Vec<PathBuf>,
    cursor: usize,
    loop_playback: bool,
    frame_limit: Option<u64>,
    seq: u64,
    pacer: Pacer,
    closed: bool,
}

impl ImageSequenceCamera {
    /// Scan the configured directory
    ///
    /// # Errors
    /// `DeviceUnavailable` if the directory is missing or holds no images
    pub fn open(config: &CameraConfig) -> Result<Self, ContractError> {
        let dir = config.path.as_deref().ok_or_else(|| {
            ContractError::device_unavailable(&config.device_id, "no image directory configured")
        })?;
        let files = list_images(dir).map_err(|e| {
            ContractError::device_unavailable(
                &config.device_id,
                format!("cannot read {}: {e}", dir.display()),
            )
        })?;
        if files.is_empty() {
            return Err(ContractError::device_unavailable(
                &config.device_id,
                format!("no images in {}", dir.display()),
            ));
        }

        info!(
            device_id = %config.device_id,
            dir = %dir.display(),
            images = files.len(),
            loop_playback = config.loop_playback,
            "opened image sequence"
        );

        Ok(Self {
            device_id: config.device_id.clone(),
            width: config.width,
            height: config.height,
            files,
            cursor: 0,
            loop_playback: config.loop_playback,
            frame_limit: config.frame_limit,
            seq: 0,
            pacer: Pacer::new(config.fps, config.throttle),
            closed: false,
        })
    }

    fn decode(&self, path: &Path) -> Result<Vec<u8>, ContractError> {
        let decoded = image::open(path).map_err(|e| {
            ContractError::transient_frame(&self.device_id, format!("{}: {e}", path.display()))
        })?;
        let mut rgb = decoded.to_rgb8();
        if rgb.dimensions() != (self.width, self.height) {
            rgb = image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle);
        }
        Ok(rgb.into_raw())
    }
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

impl FrameSource for ImageSequenceCamera {
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
        if self.cursor >= self.files.len() {
            if !self.loop_playback {
                info!(device_id = %self.device_id, frames = self.seq, "image sequence finished");
                return Ok(None);
            }
            debug!(device_id = %self.device_id, "looping image sequence");
            self.cursor = 0;
        }

        self.pacer.wait();
        let path = self.files[self.cursor].clone();
        self.cursor += 1;

        // 解码失败计为一次读取失败，由上层决定是否结束流
        let pixels = self.decode(&path).inspect_err(|e| {
            warn!(device_id = %self.device_id, error = %e, "failed to decode image");
        })?;
        let frame = Frame::new(self.seq, unix_timestamp(), self.width, self.height, pixels);
        self.seq += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!(device_id = %self.device_id, frames = self.seq, "image sequence closed");
        }
    }
}
