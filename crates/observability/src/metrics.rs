//! Pipeline 指标收集模块
//!
//! 记录每个 tick 的运行指标，并在内存中聚合成会话摘要。

use std::collections::BTreeMap;

use contracts::FaceOrientation;
use metrics::{counter, gauge, histogram};

/// 记录一次 orchestrator tick
///
/// `hands` 是本 tick 检测到的手数量 (没有手结果时为 None)。
pub fn record_tick(latency_ms: f64, hands: Option<usize>) {
    counter!("handsynth_ticks_total").increment(1);
    histogram!("handsynth_tick_latency_ms").record(latency_ms);

    match hands {
        Some(count) => gauge!("handsynth_hands_detected").set(count as f64),
        None => counter!("handsynth_ticks_without_hand_total").increment(1),
    }
}

/// 记录面部朝向 (度)
pub fn record_face_orientation(orientation: &FaceOrientation) {
    gauge!("handsynth_face_yaw_deg").set(orientation.yaw);
    gauge!("handsynth_face_pitch_deg").set(orientation.pitch);
    gauge!("handsynth_face_roll_deg").set(orientation.roll);
}

/// 记录某个 worker 在途帧数量
pub fn record_in_flight(worker: &str, in_flight: u64) {
    gauge!(
        "handsynth_frames_in_flight",
        "worker" => worker.to_string()
    )
    .set(in_flight as f64);
}

/// 记录会话输出文件写入结果
pub fn record_output_written(output: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "handsynth_outputs_total",
        "output" => output.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Pipeline 指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct PipelineMetricsAggregator {
    /// 总 tick 数
    pub total_ticks: u64,

    /// 有手部结果的 tick 数
    pub hand_ticks: u64,

    /// 有面部结果的 tick 数
    pub face_ticks: u64,

    /// tick 耗时统计 (毫秒)
    pub tick_stats: RunningStats,

    /// 每 tick 手数量统计
    pub hands_stats: RunningStats,

    /// 面部朝向统计 (度)
    pub yaw_stats: RunningStats,
    pub pitch_stats: RunningStats,
    pub roll_stats: RunningStats,

    /// 各输出失败次数
    pub output_failures: BTreeMap<String, u64>,
}

impl PipelineMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新一次 tick 的统计
    pub fn update_tick(&mut self, latency_ms: f64, hands: Option<usize>, face: Option<&FaceOrientation>) {
        self.total_ticks += 1;
        self.tick_stats.push(latency_ms);

        if let Some(count) = hands {
            self.hand_ticks += 1;
            self.hands_stats.push(count as f64);
        }

        if let Some(orientation) = face {
            self.face_ticks += 1;
            self.yaw_stats.push(orientation.yaw);
            self.pitch_stats.push(orientation.pitch);
            self.roll_stats.push(orientation.roll);
        }
    }

    /// 记录一个失败的输出
    pub fn record_output_failure(&mut self, output: &str) {
        *self.output_failures.entry(output.to_string()).or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let rate = |n: u64| {
            if self.total_ticks > 0 {
                n as f64 / self.total_ticks as f64 * 100.0
            } else {
                0.0
            }
        };
        MetricsSummary {
            total_ticks: self.total_ticks,
            hand_ticks: self.hand_ticks,
            face_ticks: self.face_ticks,
            hand_rate: rate(self.hand_ticks),
            face_rate: rate(self.face_ticks),
            tick_latency_ms: StatsSummary::from(&self.tick_stats),
            hands_per_tick: StatsSummary::from(&self.hands_stats),
            yaw_deg: StatsSummary::from(&self.yaw_stats),
            pitch_deg: StatsSummary::from(&self.pitch_stats),
            roll_deg: StatsSummary::from(&self.roll_stats),
            output_failures: self.output_failures.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub hand_ticks: u64,
    pub face_ticks: u64,
    pub hand_rate: f64,
    pub face_rate: f64,
    pub tick_latency_ms: StatsSummary,
    pub hands_per_tick: StatsSummary,
    pub yaw_deg: StatsSummary,
    pub pitch_deg: StatsSummary,
    pub roll_deg: StatsSummary,
    pub output_failures: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pipeline Metrics Summary ===")?;
        writeln!(f, "Total ticks: {}", self.total_ticks)?;
        writeln!(f, "Ticks with hands: {} ({:.2}%)", self.hand_ticks, self.hand_rate)?;
        writeln!(f, "Ticks with face: {} ({:.2}%)", self.face_ticks, self.face_rate)?;
        writeln!(f, "Tick latency (ms): {}", self.tick_latency_ms)?;
        writeln!(f, "Hands per tick: {}", self.hands_per_tick)?;
        writeln!(f, "Yaw (deg): {}", self.yaw_deg)?;
        writeln!(f, "Pitch (deg): {}", self.pitch_deg)?;
        writeln!(f, "Roll (deg): {}", self.roll_deg)?;

        if !self.output_failures.is_empty() {
            writeln!(f, "Failed outputs:")?;
            for (output, count) in &self.output_failures {
                writeln!(f, "  {}: {}", output, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值 (非有限值忽略)
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [4.0, 1.0, f64::NAN, 3.0, 5.0, 2.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = PipelineMetricsAggregator::new();
        let face = FaceOrientation {
            yaw: 10.0,
            pitch: -2.0,
            roll: 1.0,
        };

        aggregator.update_tick(12.0, Some(1), Some(&face));
        aggregator.update_tick(8.0, None, Some(&face));
        aggregator.update_tick(10.0, Some(2), None);
        aggregator.record_output_failure("hand_trajectory_3d.gif");

        let summary = aggregator.summary();
        assert_eq!(summary.total_ticks, 3);
        assert_eq!(summary.hand_ticks, 2);
        assert_eq!(summary.face_ticks, 2);
        assert!((summary.tick_latency_ms.mean - 10.0).abs() < 1e-10);
        assert!((summary.hands_per_tick.max - 2.0).abs() < 1e-10);
        assert_eq!(summary.output_failures.get("hand_trajectory_3d.gif"), Some(&1));

        aggregator.reset();
        assert_eq!(aggregator.total_ticks, 0);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = PipelineMetricsAggregator::new();
        for _ in 0..4 {
            aggregator.update_tick(20.0, Some(1), None);
        }
        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total ticks: 4"));
        assert!(output.contains("Ticks with hands: 4 (100.00%)"));
        assert!(output.contains("Yaw (deg): N/A"));
    }
}
