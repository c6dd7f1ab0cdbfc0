//! YUV4MPEG2 (.y4m) video writer
//!
//! Uncompressed 4:4:4 frames; every major player and `ffmpeg` read it
//! directly.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::Frame;
use tracing::debug;

use crate::error::{RecorderError, Result};

/// Streaming Y4M encoder for one fixed-size stream
pub struct VideoEncoder {
    path: PathBuf,
    width: u32,
    height: u32,
    out: Option<BufWriter<File>>,
    frames_written: u64,
    planes: Vec<u8>,
}

impl VideoEncoder {
    /// Create the file and write the stream header
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "YUV4MPEG2 W{width} H{height} F{}:1 Ip A1:1 C444", fps.max(1))?;
        debug!(path = %path.display(), width, height, fps, "video stream opened");
        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            out: Some(out),
            frames_written: 0,
            planes: Vec::with_capacity(width as usize * height as usize * 3),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append one RGB8 frame; its size must match the stream
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height || !frame.is_well_formed() {
            return Err(RecorderError::FrameMismatch {
                resource: self.path.display().to_string(),
                width: frame.width(),
                height: frame.height(),
                expected_width: self.width,
                expected_height: self.height,
            });
        }
        let Some(out) = self.out.as_mut() else {
            return Err(RecorderError::encode(self.path.display().to_string(), "stream closed"));
        };

        rgb_to_yuv444(frame.pixels(), &mut self.planes);
        out.write_all(b"FRAME\n")?;
        out.write_all(&self.planes)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush and close the stream (idempotent)
    pub fn finish(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
            debug!(path = %self.path.display(), frames = self.frames_written, "video stream closed");
        }
        Ok(())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// BT.601 studio-range conversion into planar Y, U, V
fn rgb_to_yuv444(rgb: &[u8], planes: &mut Vec<u8>) {
    let n = rgb.len() / 3;
    planes.clear();
    planes.resize(n * 3, 0);
    let (y_plane, rest) = planes.split_at_mut(n);
    let (u_plane, v_plane) = rest.split_at_mut(n);

    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (r, g, b) = (i32::from(px[0]), i32::from(px[1]), i32::from(px[2]));
        y_plane[i] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8;
        u_plane[i] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
        v_plane[i] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.y4m");
        let mut encoder = VideoEncoder::create(&path, 4, 2, 20).unwrap();
        encoder.write_frame(&Frame::filled(0, 0.0, 4, 2, [255, 255, 255])).unwrap();
        encoder.write_frame(&Frame::filled(1, 0.0, 4, 2, [0, 0, 0])).unwrap();
        encoder.finish().unwrap();
        encoder.finish().unwrap();
        assert_eq!(encoder.frames_written(), 2);

        let bytes = std::fs::read(&path).unwrap();
        let header = b"YUV4MPEG2 W4 H2 F20:1 Ip A1:1 C444\n";
        assert!(bytes.starts_with(header));
        let frame_len = 6 + 4 * 2 * 3;
        assert_eq!(bytes.len(), header.len() + 2 * frame_len);
        // white -> Y 235, black -> Y 16
        assert_eq!(bytes[header.len() + 6], 235);
        assert_eq!(bytes[header.len() + frame_len + 6], 16);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = VideoEncoder::create(&dir.path().join("x.y4m"), 4, 2, 20).unwrap();
        let err = encoder.write_frame(&Frame::filled(0, 0.0, 2, 2, [0, 0, 0])).unwrap_err();
        assert!(matches!(err, RecorderError::FrameMismatch { .. }));
        assert_eq!(encoder.frames_written(), 0);
    }

    #[test]
    fn test_neutral_chroma_for_grey() {
        let mut planes = Vec::new();
        rgb_to_yuv444(&[128, 128, 128], &mut planes);
        assert_eq!(planes[1], 128);
        assert_eq!(planes[2], 128);
    }
}
