//! ClockSample - 由播放器集成方推送
//!
//! 核心从不轮询播放器；宿主按自身节奏推送采样。

use serde::{Deserialize, Serialize};

/// 播放位置采样
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockSample {
    /// 主内容位置 (program date, 毫秒)
    pub position: f64,

    /// 播放速率 (1.0 = 正常速度, 0.0 = 暂停)
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// 次级 (插播) 播放器状态，流中有插播时才存在
    #[serde(default)]
    pub secondary: Option<SecondaryStatus>,
}

fn default_rate() -> f64 {
    1.0
}

impl ClockSample {
    /// 正常速度、无次级内容的采样
    pub fn at(position: f64) -> Self {
        Self {
            position,
            rate: 1.0,
            secondary: None,
        }
    }
}

/// 宿主上报的次级播放器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryState {
    Playing,
    /// 暂停、缓冲、等待或空闲
    #[default]
    Other,
}

/// 次级内容流状态
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SecondaryStatus {
    pub state: SecondaryState,
    /// 次级播放最近一次停止的位置
    #[serde(default)]
    pub stop_time: Option<f64>,
    /// 当前次级条目开始的位置
    #[serde(default)]
    pub start_time: Option<f64>,
    /// 当前次级条目时长
    #[serde(default)]
    pub duration: Option<f64>,
}

impl SecondaryStatus {
    /// 次级播放的预期结束位置
    pub fn expected_end(&self) -> Option<f64> {
        Some(self.start_time? + self.duration?)
    }
}
