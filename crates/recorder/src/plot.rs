//! Face orientation plot: yaw, pitch and roll over time, one panel each

use std::path::Path;

use contracts::FaceOrientationSample;
use image::{Rgb, RgbImage};

use crate::draw::{self, AXIS, BLACK, BLUE, GREEN, GRID, RED, WHITE};
use crate::error::{RecorderError, Result};

const MARGIN_LEFT: i64 = 70;
const MARGIN_RIGHT: i64 = 30;
const MARGIN_TOP: i64 = 36;
const MARGIN_BOTTOM: i64 = 30;
const GRID_LINES: i64 = 4;

struct Panel<'a> {
    title: &'a str,
    color: Rgb<u8>,
    value: fn(&FaceOrientationSample) -> f64,
}

fn yaw(s: &FaceOrientationSample) -> f64 {
    s.yaw
}

fn pitch(s: &FaceOrientationSample) -> f64 {
    s.pitch
}

fn roll(s: &FaceOrientationSample) -> f64 {
    s.roll
}

const PANELS: [Panel<'static>; 3] = [
    Panel {
        title: "Yaw (deg)",
        color: BLUE,
        value: yaw,
    },
    Panel {
        title: "Pitch (deg)",
        color: RED,
        value: pitch,
    },
    Panel {
        title: "Roll (deg)",
        color: GREEN,
        value: roll,
    },
];

/// Render the three stacked panels
pub fn render_orientation_plot(
    samples: &[FaceOrientationSample],
    width: u32,
    height: u32,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, WHITE);
    let panel_height = i64::from(height) / PANELS.len() as i64;
    let start = samples.first().map_or(0.0, |s| s.timestamp);
    let duration = samples
        .last()
        .map_or(0.0, |s| s.timestamp - start)
        .max(f64::EPSILON);

    for (i, panel) in PANELS.iter().enumerate() {
        let top = i as i64 * panel_height;
        let area = PlotArea {
            x: MARGIN_LEFT,
            y: top + MARGIN_TOP,
            w: (i64::from(width) - MARGIN_LEFT - MARGIN_RIGHT).max(1),
            h: (panel_height - MARGIN_TOP - MARGIN_BOTTOM).max(1),
        };
        draw::text(&mut img, MARGIN_LEFT, top + 10, panel.title, 2, BLACK);

        let (lo, hi) = value_range(samples.iter().map(panel.value));
        area.grid(&mut img, lo, hi);

        let points: Vec<(i64, i64)> = samples
            .iter()
            .map(|s| {
                let fx = (s.timestamp - start) / duration;
                let fy = ((panel.value)(s) - lo) / (hi - lo);
                area.project(fx, fy)
            })
            .collect();
        for pair in points.windows(2) {
            draw::thick_line(&mut img, pair[0], pair[1], 2, panel.color);
        }
        if let [only] = points.as_slice() {
            draw::disc(&mut img, *only, 2, panel.color);
        }
    }
    img
}

/// Render and save as PNG
pub fn save_orientation_plot(
    path: &Path,
    samples: &[FaceOrientationSample],
    width: u32,
    height: u32,
) -> Result<()> {
    render_orientation_plot(samples, width, height)
        .save(path)
        .map_err(|e| RecorderError::encode(path.display().to_string(), e.to_string()))
}

struct PlotArea {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl PlotArea {
    /// (0,0) is bottom-left, (1,1) top-right
    fn project(&self, fx: f64, fy: f64) -> (i64, i64) {
        let px = self.x + (fx.clamp(0.0, 1.0) * (self.w - 1) as f64).round() as i64;
        let py = self.y + self.h - 1 - (fy.clamp(0.0, 1.0) * (self.h - 1) as f64).round() as i64;
        (px, py)
    }

    fn grid(&self, img: &mut RgbImage, lo: f64, hi: f64) {
        for k in 1..GRID_LINES {
            let f = k as f64 / GRID_LINES as f64;
            let (_, gy) = self.project(0.0, f);
            draw::line(img, (self.x, gy), (self.x + self.w - 1, gy), GRID);
            let (gx, _) = self.project(f, 0.0);
            draw::line(img, (gx, self.y), (gx, self.y + self.h - 1), GRID);
        }
        if lo < 0.0 && hi > 0.0 {
            let (_, zy) = self.project(0.0, -lo / (hi - lo));
            draw::line(img, (self.x, zy), (self.x + self.w - 1, zy), AXIS);
        }
        draw::stroke_rect(img, self.x, self.y, self.w, self.h, AXIS);

        let top = format!("{hi:.0}");
        let bottom = format!("{lo:.0}");
        let (tw, _) = draw::text_size(&top, 1);
        let (bw, th) = draw::text_size(&bottom, 1);
        draw::text(img, self.x - i64::from(tw) - 6, self.y, &top, 1, BLACK);
        draw::text(
            img,
            self.x - i64::from(bw) - 6,
            self.y + self.h - i64::from(th),
            &bottom,
            1,
            BLACK,
        );
    }
}

/// Value bounds with 10% padding; a flat series gets a ±1° band
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (-1.0, 1.0);
    }
    let span = hi - lo;
    if span < 1e-9 {
        return (lo - 1.0, hi + 1.0);
    }
    (lo - span * 0.1, hi + span * 0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<FaceOrientationSample> {
        (0..50)
            .map(|i| FaceOrientationSample {
                timestamp: 1000.0 + f64::from(i) * 0.05,
                yaw: f64::from(i) - 25.0,
                pitch: 5.0,
                roll: (f64::from(i) * 0.2).sin() * 10.0,
            })
            .collect()
    }

    #[test]
    fn test_plot_draws_each_series() {
        let img = render_orientation_plot(&samples(), 600, 600);
        assert_eq!(img.dimensions(), (600, 600));
        for color in [BLUE, RED, GREEN] {
            assert!(img.pixels().any(|p| *p == color), "missing series color {color:?}");
        }
    }

    #[test]
    fn test_plot_saved_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        save_orientation_plot(&path, &samples(), 300, 300).unwrap();
        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 300);
    }

    #[test]
    fn test_value_range() {
        assert_eq!(value_range([2.0, 2.0].into_iter()), (1.0, 3.0));
        assert_eq!(value_range(std::iter::empty()), (-1.0, 1.0));
        let (lo, hi) = value_range([0.0, 10.0].into_iter());
        assert!((lo + 1.0).abs() < 1e-9 && (hi - 11.0).abs() < 1e-9);
    }
}
