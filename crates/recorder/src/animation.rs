//! Rotating 3D hand trajectory animation (GIF)
//!
//! All hands are merged into one time-ordered series. Each animation frame
//! shows the last `trail_length` samples as a line plus a marker on the
//! current sample, while the view orbits 1° per frame at 20° elevation.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use contracts::HandTrajectorySample;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, RgbImage};
use nalgebra::{Point3, Rotation3, Vector3};

use crate::draw::{self, AXIS, BLUE, GRID, RED, WHITE};
use crate::error::{RecorderError, Result};

/// Margin added to the data bounds on every axis
const AXIS_MARGIN: f32 = 0.1;
const ELEVATION_DEG: f32 = 20.0;
/// NeuQuant sampling factor (1 best .. 30 fastest)
const GIF_SPEED: i32 = 10;

/// Animation parameters
#[derive(Debug, Clone, Copy)]
pub struct AnimationSettings {
    pub size: u32,
    pub fps: u32,
    pub trail_length: usize,
    pub max_frames: usize,
}

/// Merge every hand's samples into one series ordered by timestamp
pub fn merge_by_timestamp(
    hands: &BTreeMap<usize, Vec<HandTrajectorySample>>,
) -> Vec<HandTrajectorySample> {
    let mut merged: Vec<HandTrajectorySample> = hands.values().flatten().copied().collect();
    merged.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    merged
}

/// Axis-aligned bounds of the data, expanded by the margin
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min: Point3<f32>,
    max: Point3<f32>,
}

impl Bounds {
    fn of(samples: &[HandTrajectorySample]) -> Option<Self> {
        let mut points = samples
            .iter()
            .map(|s| Point3::new(s.x, s.y, s.z))
            .filter(|p| p.iter().all(|v| v.is_finite()));
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(lo, hi), p| {
            (lo.inf(&p), hi.sup(&p))
        });
        let margin = Vector3::repeat(AXIS_MARGIN);
        Some(Self {
            min: min - margin,
            max: max + margin,
        })
    }

    /// Map into the unit cube centred on the origin
    fn normalize(&self, p: Point3<f32>) -> Point3<f32> {
        let extent = self.max - self.min;
        let centre = nalgebra::center(&self.min, &self.max);
        Point3::from((p - centre).component_div(&extent))
    }

    fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(b.x, b.y, b.z),
            Point3::new(a.x, b.y, b.z),
        ]
    }
}

#[rustfmt::skip]
const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1), (1, 2), (2, 3), (3, 0),
    (4, 5), (5, 6), (6, 7), (7, 4),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

/// Orthographic camera orbiting the data (z is the vertical axis)
struct Camera {
    view: Rotation3<f32>,
    size: f32,
}

impl Camera {
    fn new(azimuth_deg: f32, size: u32) -> Self {
        let azimuth = Rotation3::from_axis_angle(&Vector3::z_axis(), -azimuth_deg.to_radians());
        let elevation = Rotation3::from_axis_angle(&Vector3::x_axis(), ELEVATION_DEG.to_radians());
        Self {
            view: elevation * azimuth,
            size: size as f32,
        }
    }

    fn project(&self, unit: Point3<f32>) -> (i64, i64) {
        let v = self.view * unit;
        // the unit cube's diagonal must fit the frame
        let scale = self.size * 0.55;
        let sx = self.size / 2.0 + v.x * scale;
        let sy = self.size / 2.0 - v.z * scale;
        (sx.round() as i64, sy.round() as i64)
    }
}

/// Frame `index` of `frames` shows samples `[start, end)`
fn window(index: usize, frames: usize, samples: usize, trail: usize) -> (usize, usize) {
    let end = ((index + 1) * samples / frames).clamp(1, samples);
    (end.saturating_sub(trail.max(1)), end)
}

fn render_frame(
    samples: &[HandTrajectorySample],
    bounds: &Bounds,
    azimuth_deg: f32,
    span: (usize, usize),
    size: u32,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(size, size, WHITE);
    let camera = Camera::new(azimuth_deg, size);

    let corners = bounds.corners().map(|c| camera.project(bounds.normalize(c)));
    for (i, (a, b)) in CUBE_EDGES.iter().enumerate() {
        // floor edges darker
        let color = if i < 4 { AXIS } else { GRID };
        draw::line(&mut img, corners[*a], corners[*b], color);
    }

    let trail: Vec<(i64, i64)> = samples[span.0..span.1]
        .iter()
        .map(|s| camera.project(bounds.normalize(Point3::new(s.x, s.y, s.z))))
        .collect();
    for pair in trail.windows(2) {
        draw::thick_line(&mut img, pair[0], pair[1], 2, BLUE);
    }
    if let Some(current) = trail.last() {
        draw::disc(&mut img, *current, (size / 80).max(3) as i64, RED);
    }
    img
}

/// Render the animation frames without encoding
pub fn render_trajectory_frames(
    hands: &BTreeMap<usize, Vec<HandTrajectorySample>>,
    settings: &AnimationSettings,
) -> Vec<RgbImage> {
    let samples = merge_by_timestamp(hands);
    let Some(bounds) = Bounds::of(&samples) else {
        return Vec::new();
    };
    let frames = samples.len().min(settings.max_frames.max(1));
    (0..frames)
        .map(|i| {
            let span = window(i, frames, samples.len(), settings.trail_length);
            render_frame(&samples, &bounds, i as f32, span, settings.size)
        })
        .collect()
}

/// Render and encode as an endlessly looping GIF.
///
/// Returns the number of frames written.
pub fn save_trajectory_animation(
    path: &Path,
    hands: &BTreeMap<usize, Vec<HandTrajectorySample>>,
    settings: &AnimationSettings,
) -> Result<usize> {
    let resource = path.display().to_string();
    let frames = render_trajectory_frames(hands, settings);
    if frames.is_empty() {
        return Err(RecorderError::encode(resource, "no finite samples"));
    }

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = GifEncoder::new_with_speed(file, GIF_SPEED);
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|e| RecorderError::encode(&resource, e.to_string()))?;

    let delay = Delay::from_numer_denom_ms(1000, settings.fps.max(1));
    let count = frames.len();
    for frame in frames {
        let rgba = DynamicImage::ImageRgb8(frame).into_rgba8();
        encoder
            .encode_frame(image::Frame::from_parts(rgba, 0, 0, delay))
            .map_err(|e| RecorderError::encode(&resource, e.to_string()))?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: f64, x: f32) -> HandTrajectorySample {
        HandTrajectorySample {
            timestamp,
            x,
            y: 0.5 + x / 4.0,
            z: -0.02,
            is_palm_up: false,
        }
    }

    fn settings() -> AnimationSettings {
        AnimationSettings {
            size: 64,
            fps: 20,
            trail_length: 30,
            max_frames: 900,
        }
    }

    #[test]
    fn test_merge_orders_hands_by_time() {
        let mut hands = BTreeMap::new();
        hands.insert(0, vec![sample(2.0, 0.1), sample(4.0, 0.2)]);
        hands.insert(1, vec![sample(1.0, 0.3), sample(3.0, 0.4)]);
        let merged = merge_by_timestamp(&hands);
        let times: Vec<f64> = merged.iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_bounds_include_margin() {
        let bounds = Bounds::of(&[sample(0.0, 0.2), sample(1.0, 0.6)]).unwrap();
        assert!((bounds.min.x - 0.1).abs() < 1e-6);
        assert!((bounds.max.x - 0.7).abs() < 1e-6);
        assert!(Bounds::of(&[]).is_none());
    }

    #[test]
    fn test_trail_window() {
        assert_eq!(window(0, 100, 100, 30), (0, 1));
        assert_eq!(window(49, 100, 100, 30), (20, 50));
        assert_eq!(window(99, 100, 100, 30), (70, 100));
        // subsampled: last frame still reaches the last sample
        assert_eq!(window(9, 10, 1000, 30), (970, 1000));
    }

    #[test]
    fn test_frame_cap() {
        let mut hands = BTreeMap::new();
        hands.insert(0, (0..50).map(|i| sample(f64::from(i), i as f32 / 50.0)).collect());
        let capped = AnimationSettings {
            max_frames: 12,
            ..settings()
        };
        let frames = render_trajectory_frames(&hands, &capped);
        assert_eq!(frames.len(), 12);
        assert!(frames[11].pixels().any(|p| *p == RED));
    }

    #[test]
    fn test_gif_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.gif");
        let mut hands = BTreeMap::new();
        hands.insert(0, (0..5).map(|i| sample(f64::from(i), i as f32 / 5.0)).collect());
        assert_eq!(save_trajectory_animation(&path, &hands, &settings()).unwrap(), 5);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
