//! TimeRange - 闭区间运算
//!
//! 所有比较两端均包含，边界时间戳属于该区间。由两点构造的区间会被规范化；
//! 查询方法也能处理两端颠倒的手工构造区间。

use serde::{Deserialize, Serialize};

/// 闭区间 `[start, end]`，单位毫秒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// 由任意顺序的两点构造区间
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// 位于 `t` 的零长度区间
    pub fn point(t: f64) -> Self {
        Self { start: t, end: t }
    }

    /// 从 `start` 开始、持续 `duration` 的区间
    pub fn from_start(start: f64, duration: f64) -> Self {
        Self::new(start, start + duration)
    }

    #[inline]
    fn lo(&self) -> f64 {
        self.start.min(self.end)
    }

    #[inline]
    fn hi(&self) -> f64 {
        self.start.max(self.end)
    }

    /// 区间长度
    pub fn duration(&self) -> f64 {
        self.hi() - self.lo()
    }

    /// `point` 位于闭区间内
    #[inline]
    pub fn contains(&self, point: f64) -> bool {
        self.lo() <= point && point <= self.hi()
    }

    /// 任一区间的某个端点落在另一区间内
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.contains(other.lo())
            || self.contains(other.hi())
            || other.contains(self.lo())
            || other.contains(self.hi())
    }

    /// `self` 完全嵌套在 `other` 内
    pub fn is_within(&self, other: &TimeRange) -> bool {
        other.lo() <= self.lo() && self.hi() <= other.hi()
    }

    /// 两个区间的公共部分（若重叠）
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(TimeRange {
            start: self.lo().max(other.lo()),
            end: self.hi().min(other.hi()),
        })
    }

    /// 起点向前扩展 `before`、终点向后扩展 `after`
    pub fn padded(&self, before: f64, after: f64) -> TimeRange {
        TimeRange::new(self.lo() - before, self.hi() + after)
    }

    /// 规范化副本
    pub fn normalized(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.0}, {:.0}]", self.start, self.end)
    }
}
