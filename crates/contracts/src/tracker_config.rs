//! 可跨 crate 共享的追踪器配置契约。

use serde::{Deserialize, Serialize};

/// 完整追踪器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 调度引擎参数
    #[serde(default)]
    pub engine: EngineConfig,

    /// 会话连接参数 (URL, 周期)
    #[serde(default)]
    pub session: SessionConfig,
}

/// 调度引擎参数（除注明外单位为毫秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 仍视为连续播放的最大 位置/墙钟 比值
    pub max_speed: f64,

    /// 匹配 tick 时广告时段和广告窗口后的补偿
    pub end_tolerance_ms: f64,

    /// 追踪点投递窗口的最小长度
    pub min_dispatch_window_ms: f64,

    /// 匹配 tick 时追踪点起点前的补偿
    pub pre_roll_tolerance_ms: f64,

    /// 次级停止时间、预期结束与播放位置之间允许的偏差
    pub secondary_tolerance_ms: f64,

    /// 未出现在新文档中的时段在结束后保留多久
    pub retention_ms: f64,

    /// 已播放区间在结束后保留多久
    pub played_retention_ms: f64,

    /// 位置采样的预期周期；追踪器容差为其两倍
    pub sampling_period_ms: f64,

    /// 计入已播放区间的最低正常速率
    pub normal_rate_min: f64,

    /// 计入已播放区间的最高正常速率
    pub normal_rate_max: f64,

    /// 文档在当前位置之后至少还需有效这么久
    pub early_fetch_ms: f64,

    /// 不在任何时段内时触发调度重置的位置跳变
    pub time_jump_reset_ms: f64,

    /// 判断跳变是否离开时段时，时段起点前的补偿
    pub time_jump_start_tolerance_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_speed: 2.5,
            end_tolerance_ms: 500.0,
            min_dispatch_window_ms: 1_000.0,
            pre_roll_tolerance_ms: 0.0,
            secondary_tolerance_ms: 1_500.0,
            retention_ms: 120_000.0,
            played_retention_ms: 120_000.0,
            sampling_period_ms: 500.0,
            normal_rate_min: 0.95,
            normal_rate_max: 1.05,
            early_fetch_ms: 5_000.0,
            time_jump_reset_ms: 60_000.0,
            time_jump_start_tolerance_ms: 4_000.0,
        }
    }
}

impl EngineConfig {
    /// 已播放区间追踪器的合并容差
    pub fn played_tolerance_ms(&self) -> f64 {
        self.sampling_period_ms * 2.0
    }
}

/// 会话连接参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 用于推导元数据 URL 的媒体 (manifest) URL
    pub media_url: Option<String>,

    /// 显式元数据 URL（优先于推导）
    pub metadata_url: Option<String>,

    /// 元数据刷新周期
    pub refresh_interval_ms: u64,

    /// 调度 tick 周期
    pub tick_interval_ms: u64,

    /// 位置采样周期
    pub sample_interval_ms: u64,

    /// HTTP 协作方的单次请求超时
    pub request_timeout_ms: u64,

    /// 投递报告队列容量
    pub report_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            media_url: None,
            metadata_url: None,
            refresh_interval_ms: 4_000,
            tick_interval_ms: 500,
            sample_interval_ms: 100,
            request_timeout_ms: 10_000,
            report_queue_capacity: 256,
        }
    }
}
