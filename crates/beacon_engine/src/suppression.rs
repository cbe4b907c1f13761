//! 次级内容抑制策略
//!
//! 存在次级流但未在播放、且位置位于时段内时，时钟不可信。唯一例外是次级播放
//! 刚刚结束的时刻：其停止时间同时接近预期结束和当前位置。

use contracts::{ClockSample, SecondaryState};

/// 判断采样时钟能否驱动投递
#[derive(Debug, Clone, Copy)]
pub struct SuppressionPolicy {
    tolerance_ms: f64,
}

impl SuppressionPolicy {
    pub fn new(tolerance_ms: f64) -> Self {
        Self { tolerance_ms }
    }

    /// `in_break` 表示采样位置是否位于某个调度节点内
    pub fn is_suppressed(&self, sample: &ClockSample, in_break: bool) -> bool {
        let Some(secondary) = sample.secondary else {
            return false;
        };
        if secondary.state == SecondaryState::Playing || !in_break {
            return false;
        }

        let just_finished = match (secondary.stop_time, secondary.expected_end()) {
            (Some(stop), Some(expected_end)) => {
                (stop - expected_end).abs() <= self.tolerance_ms
                    && (stop - sample.position).abs() <= self.tolerance_ms
            }
            _ => false,
        };
        !just_finished
    }
}
