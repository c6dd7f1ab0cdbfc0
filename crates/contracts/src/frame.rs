//! Frame - Frame Source output
//!
//! A timestamped RGB8 pixel buffer.

use std::time::{SystemTime, UNIX_EPOCH};

/// Bytes per pixel (RGB8)
const CHANNELS: usize = 3;

/// Captured image
///
/// `Clone` is a deep copy of the pixel buffer; a frame handed to another
/// thread is always a fresh copy, never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Capture counter of the producing source
    pub seq: u64,

    /// Capture time (seconds since UNIX epoch)
    pub timestamp: f64,

    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap a raw RGB8 buffer.
    ///
    /// No layout check is made here; see [`Frame::is_well_formed`].
    pub fn new(seq: u64, timestamp: f64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            seq,
            timestamp,
            width,
            height,
            pixels,
        }
    }

    /// Solid-color frame
    pub fn filled(seq: u64, timestamp: f64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(seq, timestamp, width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consume the frame, returning its pixel buffer
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Zero-sized frames act as "nothing captured" sentinels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// Buffer length matches `width * height * 3`
    pub fn is_well_formed(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * CHANNELS
    }

    /// Flip the image left-to-right in place.
    ///
    /// Malformed frames are left untouched.
    pub fn mirror_horizontal(&mut self) {
        if self.is_empty() || !self.is_well_formed() {
            return;
        }
        let row_len = self.width as usize * CHANNELS;
        for row in self.pixels.chunks_exact_mut(row_len) {
            let width = row_len / CHANNELS;
            for col in 0..width / 2 {
                let left = col * CHANNELS;
                let right = (width - 1 - col) * CHANNELS;
                for c in 0..CHANNELS {
                    row.swap(left + c, right + c);
                }
            }
        }
    }

    /// Builder-style [`Frame::mirror_horizontal`]
    pub fn mirrored(mut self) -> Self {
        self.mirror_horizontal();
        self
    }

    /// RGB value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        self.pixels
            .get(idx..idx + CHANNELS)
            .map(|p| [p[0], p[1], p[2]])
    }
}

/// Current wall-clock time in seconds since the UNIX epoch
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
