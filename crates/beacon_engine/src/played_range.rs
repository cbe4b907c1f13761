//! 已播放区间追踪器
//!
//! 维护有序、互不相交且已合并的观测位置区间列表。相邻采样间距小于容差时
//! 合并为同一区间，因此列表长度与采样频率无关。

use contracts::TimeRange;

/// 观测位置覆盖表
#[derive(Debug, Clone)]
pub struct PlayedRangeTracker {
    tolerance_ms: f64,
    ranges: Vec<TimeRange>,
}

impl PlayedRangeTracker {
    /// `tolerance_ms` 通常为预期采样周期的两倍
    pub fn new(tolerance_ms: f64) -> Self {
        Self {
            tolerance_ms,
            ranges: Vec::new(),
        }
    }

    pub fn tolerance_ms(&self) -> f64 {
        self.tolerance_ms
    }

    /// 记录一个观测位置
    ///
    /// 负数位置被忽略。
    pub fn track(&mut self, position: f64) {
        if position < 0.0 || position.is_nan() {
            return;
        }

        let tol = self.tolerance_ms;
        if let Some(range) = self
            .ranges
            .iter_mut()
            .find(|r| r.padded(tol, tol).contains(position))
        {
            range.start = range.start.min(position);
            range.end = range.end.max(position);
        } else {
            let at = self.ranges.partition_point(|r| r.start <= position);
            self.ranges.insert(at, TimeRange::point(position));
        }
        self.coalesce();
    }

    /// `position` 是否位于已记录的覆盖范围内
    pub fn was_played(&self, position: f64) -> bool {
        self.ranges.iter().any(|r| r.contains(position))
    }

    /// 丢弃结束时间早于 `now` 超过 `retention_ms` 的区间
    pub fn cleanup(&mut self, now: f64, retention_ms: f64) {
        self.ranges.retain(|r| r.end + retention_ms >= now);
    }

    pub fn reset(&mut self) {
        self.ranges.clear();
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// 取出覆盖范围中落在 `window` 内的部分
    ///
    /// 完全在内的区间被移除；跨越边界的区间只保留外侧部分。
    /// 仅与边界相接的区间保持不变。
    pub fn consume_within(&mut self, window: &TimeRange) -> Vec<TimeRange> {
        let window = window.normalized();
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.ranges.len());

        for range in self.ranges.drain(..) {
            match range.intersection(&window) {
                None => kept.push(range),
                Some(_) if range.is_within(&window) => taken.push(range),
                Some(overlap) if overlap.duration() == 0.0 => kept.push(range),
                Some(overlap) => {
                    taken.push(overlap);
                    if range.start < window.start {
                        kept.push(TimeRange::new(range.start, window.start));
                    }
                    if range.end > window.end {
                        kept.push(TimeRange::new(window.end, range.end));
                    }
                }
            }
        }

        self.ranges = kept;
        taken
    }

    fn coalesce(&mut self) {
        let tol = self.tolerance_ms;
        let mut merged: Vec<TimeRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if range.start - last.end <= tol => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }
}
