//! CSV writers for the session logs

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use contracts::{FaceOrientationSample, HandTrajectorySample};

/// `timestamp,relative_time,yaw,pitch,roll`; relative time from the first sample
pub fn write_face_csv(path: &Path, samples: &[FaceOrientationSample]) -> std::io::Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "timestamp,relative_time,yaw,pitch,roll")?;

    let start = samples.first().map_or(0.0, |s| s.timestamp);
    for s in samples {
        writeln!(
            out,
            "{:.6},{:.6},{},{},{}",
            s.timestamp,
            s.timestamp - start,
            s.yaw,
            s.pitch,
            s.roll
        )?;
    }
    out.flush()?;
    Ok(samples.len())
}

/// `timestamp,relative_time,hand_id,x,y,z,is_palm_up`, grouped by hand.
///
/// Relative time is measured from the earliest sample across all hands.
pub fn write_hand_csv(
    path: &Path,
    hands: &BTreeMap<usize, Vec<HandTrajectorySample>>,
) -> std::io::Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "timestamp,relative_time,hand_id,x,y,z,is_palm_up")?;

    let start = hands
        .values()
        .flatten()
        .map(|s| s.timestamp)
        .fold(f64::INFINITY, f64::min);

    let mut rows = 0;
    for (hand_id, samples) in hands {
        for s in samples {
            writeln!(
                out,
                "{:.6},{:.6},{},{},{},{},{}",
                s.timestamp,
                s.timestamp - start,
                hand_id,
                s.x,
                s.y,
                s.z,
                s.is_palm_up
            )?;
            rows += 1;
        }
    }
    out.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn hand_sample(timestamp: f64, x: f32) -> HandTrajectorySample {
        HandTrajectorySample {
            timestamp,
            x,
            y: 0.5,
            z: -0.01,
            is_palm_up: true,
        }
    }

    #[test]
    fn test_face_csv_relative_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.csv");
        let samples = [
            FaceOrientationSample {
                timestamp: 100.0,
                yaw: 1.5,
                pitch: -2.0,
                roll: 0.0,
            },
            FaceOrientationSample {
                timestamp: 100.25,
                yaw: 3.0,
                pitch: 0.0,
                roll: 10.0,
            },
        ];
        assert_eq!(write_face_csv(&path, &samples).unwrap(), 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,relative_time,yaw,pitch,roll");
        assert_eq!(lines[1], "100.000000,0.000000,1.5,-2,0");
        assert_eq!(lines[2], "100.250000,0.250000,3,0,10");
    }

    #[test]
    fn test_hand_csv_relative_to_earliest_hand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hands.csv");
        let mut hands = BTreeMap::new();
        hands.insert(0, vec![hand_sample(10.5, 0.5), hand_sample(11.0, 0.6)]);
        hands.insert(1, vec![hand_sample(10.0, 0.2)]);
        assert_eq!(write_hand_csv(&path, &hands).unwrap(), 3);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("10.500000,0.500000,0,0.5,"));
        assert!(lines[3].starts_with("10.000000,0.000000,1,0.2,"));
        assert!(lines[3].ends_with(",true"));
    }
}
