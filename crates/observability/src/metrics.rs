//! 广告追踪指标收集模块
//!
//! 基于 `metrics` facade 的轻量封装，以及用于运行结束汇总的内存统计。

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// 记录单个 URL 的 beacon 结果
///
/// `status` 为 `delivered`、`rejected` 或 `transport_error`。
pub fn record_beacon(kind: &str, status: &str) {
    counter!(
        "ad_tracker_beacons_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录单个 beacon 请求的延迟
pub fn record_delivery_latency_ms(latency_ms: f64) {
    histogram!("ad_tracker_delivery_latency_ms").record(latency_ms);
}

/// 记录 tick 决策 (`scanned`, `rate_gated`, `suppressed`, `duplicate`, `reset`)
pub fn record_tick(decision: &str) {
    counter!("ad_tracker_ticks_total", "decision" => decision.to_string()).increment(1);
}

/// 记录元数据刷新结果 (`accepted`, `anchored`, `failed`)
pub fn record_metadata_fetch(status: &str) {
    counter!("ad_tracker_metadata_fetches_total", "status" => status.to_string()).increment(1);
}

/// 记录当前调度中的追踪点数量
pub fn record_schedule_points(count: usize) {
    gauge!("ad_tracker_schedule_points").set(count as f64);
}

/// 记录追踪器持有的已播放区间数量
pub fn record_played_ranges(count: usize) {
    gauge!("ad_tracker_played_ranges").set(count as f64);
}

/// 按类型统计的投递结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub done: u64,
    pub failed: u64,
}

/// 投递统计聚合器
///
/// 在内存中聚合追踪点结果和请求延迟，用于汇总输出。
#[derive(Debug, Clone, Default)]
pub struct DeliveryAggregator {
    /// 按类型统计的已结束追踪点
    pub per_kind: BTreeMap<String, KindCounts>,

    /// 返回 2xx 的请求数
    pub urls_delivered: u64,

    /// 返回其他状态或无状态的请求数
    pub urls_failed: u64,

    /// 请求延迟
    pub latency_ms: RunningStats,
}

impl DeliveryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次请求
    pub fn record_request(&mut self, success: bool, latency_ms: f64) {
        if success {
            self.urls_delivered += 1;
        } else {
            self.urls_failed += 1;
        }
        self.latency_ms.push(latency_ms);
    }

    /// 记录追踪点进入终态
    pub fn record_point(&mut self, kind: &str, done: bool) {
        let counts = self.per_kind.entry(kind.to_string()).or_default();
        if done {
            counts.done += 1;
        } else {
            counts.failed += 1;
        }
    }

    /// 生成统计摘要
    pub fn summary(&self) -> DeliverySummary {
        let (done, failed) = self
            .per_kind
            .values()
            .fold((0, 0), |(d, f), c| (d + c.done, f + c.failed));
        let requests = self.urls_delivered + self.urls_failed;
        DeliverySummary {
            points_done: done,
            points_failed: failed,
            urls_delivered: self.urls_delivered,
            urls_failed: self.urls_failed,
            failure_rate: if requests > 0 {
                self.urls_failed as f64 / requests as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_ms),
            per_kind: self.per_kind.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 投递统计摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub points_done: u64,
    pub points_failed: u64,
    pub urls_delivered: u64,
    pub urls_failed: u64,
    pub failure_rate: f64,
    pub latency_ms: StatsSummary,
    pub per_kind: BTreeMap<String, KindCounts>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Beacon Delivery Summary ===")?;
        writeln!(f, "Points done: {}", self.points_done)?;
        writeln!(f, "Points failed: {}", self.points_failed)?;
        writeln!(
            f,
            "Requests: {} delivered, {} failed ({:.2}%)",
            self.urls_delivered, self.urls_failed, self.failure_rate
        )?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;

        if !self.per_kind.is_empty() {
            writeln!(f, "By kind:")?;
            for (kind, counts) in &self.per_kind {
                writeln!(f, "  {}: {} done, {} failed", kind, counts.done, counts.failed)?;
            }
        }

        Ok(())
    }
}

/// RunningStats 摘要
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
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线均值/方差计算 (Welford 算法)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
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
            self.m2 += delta * (value - self.mean);
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
