//! Annotations drawn on the output streams

use contracts::{face_landmarks, hand_landmarks, Frame, LandmarkSet};
use image::{Rgb, RgbImage};

use crate::draw;

const BONE: Rgb<u8> = Rgb([240, 240, 240]);
const JOINT: Rgb<u8> = Rgb([230, 40, 60]);
const FACE_POINT: Rgb<u8> = Rgb([60, 220, 90]);
const STATUS: Rgb<u8> = Rgb([0, 255, 0]);

/// Run `paint` on the frame's pixels. Malformed frames come back untouched.
fn paint_frame(frame: Frame, paint: impl FnOnce(&mut RgbImage)) -> Frame {
    if frame.is_empty() || !frame.is_well_formed() {
        return frame;
    }
    let (seq, timestamp, width, height) = (frame.seq, frame.timestamp, frame.width(), frame.height());
    match RgbImage::from_raw(width, height, frame.into_pixels()) {
        Some(mut img) => {
            paint(&mut img);
            Frame::new(seq, timestamp, width, height, img.into_raw())
        }
        None => Frame::new(seq, timestamp, width, height, Vec::new()),
    }
}

fn to_pixel(img: &RgbImage, x: f32, y: f32) -> Option<(i64, i64)> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some((
        (x * img.width() as f32).round() as i64,
        (y * img.height() as f32).round() as i64,
    ))
}

/// Hand skeleton: bones between connected landmarks and a dot per joint
pub fn draw_hand(frame: Frame, hands: &[LandmarkSet]) -> Frame {
    paint_frame(frame, |img| {
        let radius = (img.height() / 120).max(2) as i64;
        for hand in hands {
            let points: Vec<Option<(i64, i64)>> = hand
                .landmarks()
                .iter()
                .map(|lm| to_pixel(img, lm.x, lm.y))
                .collect();
            for &(a, b) in hand_landmarks::CONNECTIONS {
                if let (Some(Some(pa)), Some(Some(pb))) = (points.get(a), points.get(b)) {
                    draw::thick_line(img, *pa, *pb, 2, BONE);
                }
            }
            for p in points.iter().flatten() {
                draw::disc(img, *p, radius, JOINT);
            }
        }
    })
}

/// "Palm up: <bool>" in the top-left corner
pub fn draw_palm_status(frame: Frame, is_palm_up: bool) -> Frame {
    paint_frame(frame, |img| {
        let scale = (img.height() / 160).max(1);
        let label = format!("Palm up: {}", if is_palm_up { "True" } else { "False" });
        draw::text(img, 10, 10, &label, scale, STATUS);
    })
}

/// Key face landmarks (nose tip and eye corners)
pub fn draw_face(frame: Frame, face: &LandmarkSet) -> Frame {
    paint_frame(frame, |img| {
        let radius = (img.height() / 100).max(2) as i64;
        for index in face_landmarks::KEY_POINTS {
            if let Some(p) = face.get(index).and_then(|lm| to_pixel(img, lm.x, lm.y)) {
                draw::disc(img, p, radius, FACE_POINT);
            }
        }
    })
}
