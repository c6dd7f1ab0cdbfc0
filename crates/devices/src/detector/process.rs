//! Process detector - 外部 landmark 模型进程桥接
//!
//! Wire protocol over the child's stdin/stdout, one exchange per frame:
//!
//! ```text
//! -> {"seq":12,"width":640,"height":480,"format":"rgb8","len":921600}\n
//! -> <len raw bytes>
//! <- {"landmark_sets":[{"landmarks":[{"x":..,"y":..,"z":..}, ...],"handedness":"Left"}]}\n
//!    or {"error":"..."}\n
//! ```

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use contracts::{ContractError, Frame, LandmarkDetector, LandmarkSet, Modality};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::DetectorReply;

#[derive(Debug, Serialize)]
struct FrameHeader<'a> {
    seq: u64,
    width: u32,
    height: u32,
    format: &'a str,
    len: usize,
}

/// Landmark model running in a child process
pub struct ProcessDetector {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    line: String,
    closed: bool,
}

impl ProcessDetector {
    /// Start the model process.
    ///
    /// The modality is passed as `HANDSYNTH_MODALITY` so one script can serve both.
    pub fn spawn(command: &str, args: &[String], modality: Modality) -> Result<Self, ContractError> {
        let name = format!("process:{command}");
        let mut child = Command::new(command)
            .args(args)
            .env("HANDSYNTH_MODALITY", modality.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ContractError::device_unavailable(&name, e.to_string()))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.kill();
            return Err(ContractError::device_unavailable(&name, "stdio not captured"));
        };

        info!(detector = %name, pid = child.id(), modality = %modality, "spawned model process");

        Ok(Self {
            name,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            line: String::new(),
            closed: false,
        })
    }

    fn exchange(&mut self, frame: &Frame) -> Result<DetectorReply, ContractError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ContractError::transient_frame(&self.name, "process closed"))?;

        let header = FrameHeader {
            seq: frame.seq,
            width: frame.width(),
            height: frame.height(),
            format: "rgb8",
            len: frame.pixels().len(),
        };
        let mut header = serde_json::to_string(&header)
            .map_err(|e| ContractError::transient_frame(&self.name, e.to_string()))?;
        header.push('\n');

        let io_err = |e: std::io::Error| ContractError::transient_frame(&self.name, e.to_string());
        stdin.write_all(header.as_bytes()).map_err(io_err)?;
        stdin.write_all(frame.pixels()).map_err(io_err)?;
        stdin.flush().map_err(io_err)?;

        self.line.clear();
        let read = self.stdout.read_line(&mut self.line).map_err(io_err)?;
        if read == 0 {
            return Err(ContractError::transient_frame(
                &self.name,
                "model process closed its output",
            ));
        }
        serde_json::from_str(self.line.trim())
            .map_err(|e| ContractError::transient_frame(&self.name, format!("bad reply: {e}")))
    }
}

impl LandmarkDetector for ProcessDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ContractError> {
        let reply = self.exchange(frame)?;
        reply.into_result(&self.name)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // 关闭 stdin 让模型进程自行退出，再兜底 kill
        drop(self.stdin.take());
        match self.child.try_wait() {
            Ok(Some(status)) => debug!(detector = %self.name, %status, "model process exited"),
            _ => {
                if let Err(e) = self.child.kill() {
                    warn!(detector = %self.name, error = %e, "failed to kill model process");
                }
                let _ = self.child.wait();
                debug!(detector = %self.name, "model process killed");
            }
        }
    }
}

impl Drop for ProcessDetector {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Echo model in plain shell: consumes the header and payload, answers
    /// with one fixed landmark.
    const ECHO_MODEL: &str = r#"
while IFS= read -r header; do
  len=$(printf '%s' "$header" | sed 's/.*"len":\([0-9]*\).*/\1/')
  head -c "$len" > /dev/null
  echo '{"landmark_sets":[{"landmarks":[{"x":0.25,"y":0.75,"z":0.0}],"handedness":"Left"}]}'
done
"#;

    #[test]
    fn test_round_trip_through_shell_model() {
        let args = vec!["-c".to_string(), ECHO_MODEL.to_string()];
        let mut detector = ProcessDetector::spawn("sh", &args, Modality::Hand).unwrap();
        let frame = Frame::filled(3, 0.0, 4, 2, [1, 2, 3]);

        for _ in 0..2 {
            let sets = detector.detect(&frame).unwrap();
            assert_eq!(sets.len(), 1);
            assert_eq!(sets[0].get(0).unwrap().y, 0.75);
        }
        detector.close();
        assert!(detector.detect(&frame).is_err());
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let err = ProcessDetector::spawn("/nonexistent/model-bin", &[], Modality::Face)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
