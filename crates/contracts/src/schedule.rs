//! 调度模型 - reconciler 的输出，dispatch engine 的输入
//!
//! `ScheduleItem` (广告时段) -> `AdEvent` (广告) -> `TrackingPoint` (beacon)。
//! 只有 reconciler 增删节点。创建之后唯一可变的字段是追踪点的投递状态，
//! 它保存在共享的 `DeliveryCell` 中，
//! 进行中的投递无需访问调度树即可记录结果。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::TimeRange;

/// 追踪点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    // ===== Clock-driven =====
    Impression,
    Start,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,

    // ===== Action-driven =====
    Mute,
    Unmute,
    Pause,
    Resume,
    Rewind,
    Skip,
    PlayerExpand,
    PlayerCollapse,
    ClickTracking,

    /// 本版本无法识别的值
    Unknown,
}

impl EventKind {
    /// 报文名称 (camelCase)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::Start => "start",
            Self::FirstQuartile => "firstQuartile",
            Self::Midpoint => "midpoint",
            Self::ThirdQuartile => "thirdQuartile",
            Self::Complete => "complete",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Rewind => "rewind",
            Self::Skip => "skip",
            Self::PlayerExpand => "playerExpand",
            Self::PlayerCollapse => "playerCollapse",
            Self::ClickTracking => "clickTracking",
            Self::Unknown => "unknown",
        }
    }

    /// 解析报文名称；无法识别的映射为 `Unknown`
    pub fn from_wire(name: &str) -> Self {
        match name {
            "impression" => Self::Impression,
            "start" => Self::Start,
            "firstQuartile" => Self::FirstQuartile,
            "midpoint" => Self::Midpoint,
            "thirdQuartile" => Self::ThirdQuartile,
            "complete" => Self::Complete,
            "mute" => Self::Mute,
            "unmute" => Self::Unmute,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "rewind" => Self::Rewind,
            "skip" => Self::Skip,
            "playerExpand" => Self::PlayerExpand,
            "playerCollapse" => Self::PlayerCollapse,
            "clickTracking" => Self::ClickTracking,
            _ => Self::Unknown,
        }
    }

    /// 播放位置经过追踪窗口时触发
    pub fn is_clock_driven(&self) -> bool {
        matches!(
            self,
            Self::Impression
                | Self::Start
                | Self::FirstQuartile
                | Self::Midpoint
                | Self::ThirdQuartile
                | Self::Complete
        )
    }

    /// 仅在宿主上报对应播放器操作时触发
    pub fn is_action_driven(&self) -> bool {
        !self.is_clock_driven() && *self != Self::Unknown
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 追踪点的投递状态
///
/// `Idle -> Connecting -> Done | Failed`；只进不退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeliveryState {
    #[default]
    Idle = 0,
    Connecting = 1,
    Done = 2,
    Failed = 3,
}

impl DeliveryState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Done,
            _ => Self::Failed,
        }
    }

    /// `Done` 或 `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 追踪点投递状态的原子容器
#[derive(Debug, Default)]
pub struct DeliveryCell {
    state: AtomicU8,
}

impl DeliveryCell {
    /// 创建 idle 状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建指定状态
    pub fn with_state(state: DeliveryState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    /// 当前状态
    pub fn state(&self) -> DeliveryState {
        DeliveryState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 认领该点进行投递 (`Idle -> Connecting`)
    ///
    /// 若已离开 `Idle` 则返回 false；只有一个调用方会成功。
    pub fn try_begin(&self) -> bool {
        self.state
            .compare_exchange(
                DeliveryState::Idle as u8,
                DeliveryState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// 记录已认领投递的结果 (`Connecting -> Done | Failed`)
    ///
    /// 返回调用后的状态；不处于 `Connecting` 时保持不变。
    pub fn complete(&self, success: bool) -> DeliveryState {
        let target = if success {
            DeliveryState::Done
        } else {
            DeliveryState::Failed
        };
        match self.state.compare_exchange(
            DeliveryState::Connecting as u8,
            target as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => target,
            Err(current) => DeliveryState::from_u8(current),
        }
    }
}

/// 一次可触发的 beacon 机会
///
/// 克隆共享投递状态；克隆体观察到同一状态。
#[derive(Debug, Clone)]
pub struct TrackingPoint {
    /// 在所属广告内的标识
    pub id: String,
    pub kind: EventKind,
    /// 文档尚未填充 start/duration 时为 `None`
    pub window: Option<TimeRange>,
    pub callback_urls: Vec<String>,
    delivery: Arc<DeliveryCell>,
}

impl TrackingPoint {
    /// 创建 idle 追踪点
    pub fn new(
        id: impl Into<String>,
        kind: EventKind,
        window: Option<TimeRange>,
        callback_urls: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            window,
            callback_urls,
            delivery: Arc::new(DeliveryCell::new()),
        }
    }

    /// 替换投递状态（用于恢复或测试夹具）
    pub fn with_delivery_state(mut self, state: DeliveryState) -> Self {
        self.delivery = Arc::new(DeliveryCell::with_state(state));
        self
    }

    /// 当前投递状态
    pub fn delivery_state(&self) -> DeliveryState {
        self.delivery.state()
    }

    /// 共享投递状态
    pub fn delivery(&self) -> &Arc<DeliveryCell> {
        &self.delivery
    }

    /// 标识相同且共享同一投递状态
    pub fn shares_delivery_with(&self, other: &TrackingPoint) -> bool {
        Arc::ptr_eq(&self.delivery, &other.delivery)
    }
}

/// 时段内的一个广告
#[derive(Debug, Clone)]
pub struct AdEvent {
    pub id: String,
    pub window: Option<TimeRange>,
    pub tracking_points: Vec<TrackingPoint>,
}

/// 一个已调度的广告时段 ("pod")
#[derive(Debug, Clone)]
pub struct ScheduleItem {
    pub id: String,
    pub window: Option<TimeRange>,
    pub events: Vec<AdEvent>,
}

impl ScheduleItem {
    /// 遍历该时段下所有追踪点
    pub fn points(&self) -> impl Iterator<Item = &TrackingPoint> {
        self.events.iter().flat_map(|e| e.tracking_points.iter())
    }
}

/// 统计调度中的追踪点数量
pub fn point_count(schedule: &[ScheduleItem]) -> usize {
    schedule.iter().map(|item| item.points().count()).sum()
}

/// 供展示层使用的只读调度视图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub items: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: String,
    pub window: Option<TimeRange>,
    pub events: Vec<EventSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: String,
    pub window: Option<TimeRange>,
    pub points: Vec<PointSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSnapshot {
    pub id: String,
    pub kind: EventKind,
    pub window: Option<TimeRange>,
    pub callback_urls: Vec<String>,
    pub delivery_state: DeliveryState,
}

impl ScheduleSnapshot {
    /// 捕获 `schedule` 的当前状态
    pub fn capture(schedule: &[ScheduleItem]) -> Self {
        let items = schedule
            .iter()
            .map(|item| ItemSnapshot {
                id: item.id.clone(),
                window: item.window,
                events: item
                    .events
                    .iter()
                    .map(|event| EventSnapshot {
                        id: event.id.clone(),
                        window: event.window,
                        points: event
                            .tracking_points
                            .iter()
                            .map(|p| PointSnapshot {
                                id: p.id.clone(),
                                kind: p.kind,
                                window: p.window,
                                callback_urls: p.callback_urls.clone(),
                                delivery_state: p.delivery_state(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { items }
    }

    /// 与 `previous` 相比是否有可见差异
    pub fn changed_since(&self, previous: &ScheduleSnapshot) -> bool {
        self != previous
    }

    /// 按 id 在快照中查找追踪点
    pub fn find_point(&self, point_id: &str) -> Option<&PointSnapshot> {
        self.items
            .iter()
            .flat_map(|i| i.events.iter())
            .flat_map(|e| e.points.iter())
            .find(|p| p.id == point_id)
    }
}
