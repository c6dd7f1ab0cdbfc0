//! Capture devices
//!
//! - `SyntheticCamera`: generated test pattern, no hardware
//! - `ImageSequenceCamera`: replays a directory of still images
//! - `DeviceCamera`: physical camera through OpenCV (`opencv` feature)

#[cfg(feature = "opencv")]
mod device;
mod image_sequence;
mod synthetic;

#[cfg(feature = "opencv")]
pub use device::DeviceCamera;
pub use image_sequence::ImageSequenceCamera;
pub use synthetic::SyntheticCamera;

use std::thread;
use std::time::{Duration, Instant};

/// Holds a source to its nominal frame rate
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(fps: f64, enabled: bool) -> Self {
        let interval = (enabled && fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));
        Self {
            interval,
            next_due: None,
        }
    }

    /// Sleep until the next frame is due
    pub(crate) fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                thread::sleep(due - now);
            }
        }
        // 落后时不追帧，从当前时刻重新计时
        let base = self.next_due.filter(|due| *due > now).unwrap_or(now);
        self.next_due = Some(base + interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_pacer_never_sleeps() {
        let mut pacer = Pacer::new(1.0, false);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_pacer_holds_rate() {
        let mut pacer = Pacer::new(50.0, true);
        let start = Instant::now();
        for _ in 0..4 {
            pacer.wait();
        }
        // first call is immediate, three intervals of 20ms follow
        assert!(start.elapsed() >= Duration::from_millis(55));
    }
}
