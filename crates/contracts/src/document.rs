//! MetadataDocument - 广告追踪元数据接口的报文格式
//!
//! 所有数值字段单位为毫秒且均可缺省；广告决策尚未完成时，服务端可能
//! 下发只填了一部分的广告时段。

use serde::{Deserialize, Serialize};

use crate::{AdEvent, EventKind, ScheduleItem, TimeRange, TrackingPoint};

/// 元数据文档（顶层）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    #[serde(default)]
    pub ad_breaks: Vec<AdBreakDoc>,

    /// 本文档覆盖的流区间
    #[serde(default)]
    pub data_range: Option<DataRangeDoc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DataRangeDoc {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdBreakDoc {
    pub id: Option<String>,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    #[serde(default)]
    pub ads: Vec<AdDoc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdDoc {
    pub id: Option<String>,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    #[serde(default)]
    pub tracking_events: Vec<TrackingEventDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEventDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "unknown_kind")]
    pub event: EventKind,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    #[serde(default)]
    pub signaling_urls: Vec<String>,
}

fn unknown_kind() -> EventKind {
    EventKind::Unknown
}

fn window_of(start: Option<f64>, duration: Option<f64>) -> Option<TimeRange> {
    Some(TimeRange::from_start(start?, duration?))
}

/// 服务端未命名节点的标识
fn fallback_id(prefix: &str, start: Option<f64>) -> Option<String> {
    start.map(|s| format!("{prefix}@{s:.0}"))
}

impl TrackingEventDoc {
    /// 稳定标识：显式 id，否则为 类型 + 序号 + URL
    ///
    /// `ordinal` 为同一广告内该类型之前出现的事件数。标识不含时间字段：
    /// 广告时长修正会移动四分位点和中点，移动后的点必须保留投递状态。
    pub fn point_id(&self, ordinal: usize) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        format!(
            "{}#{}#{}",
            self.event,
            ordinal,
            self.signaling_urls.join("|")
        )
    }
}

impl MetadataDocument {
    /// 有效区间，仅当两端都存在时返回
    pub fn valid_window(&self) -> Option<TimeRange> {
        let range = self.data_range?;
        Some(TimeRange::new(range.start?, range.end?))
    }

    /// 转换为调度节点，投递状态均为 idle
    ///
    /// 既无 id 又无起始时间的时段和广告没有标识，直接跳过。
    /// 未知类型在此保留，由 reconciler 丢弃。
    pub fn to_schedule(&self) -> Vec<ScheduleItem> {
        self.ad_breaks
            .iter()
            .filter_map(|pod| {
                let id = pod
                    .id
                    .clone()
                    .or_else(|| fallback_id("pod", pod.start_time))?;
                Some(ScheduleItem {
                    id,
                    window: window_of(pod.start_time, pod.duration),
                    events: pod.ads.iter().filter_map(AdDoc::to_event).collect(),
                })
            })
            .collect()
    }
}

impl AdDoc {
    fn to_event(&self) -> Option<AdEvent> {
        let id = self
            .id
            .clone()
            .or_else(|| fallback_id("ad", self.start_time))?;
        Some(AdEvent {
            id,
            window: window_of(self.start_time, self.duration),
            tracking_points: self
                .tracking_events
                .iter()
                .enumerate()
                .map(|(index, ev)| {
                    let ordinal = self.tracking_events[..index]
                        .iter()
                        .filter(|earlier| earlier.event == ev.event)
                        .count();
                    TrackingPoint::new(
                        ev.point_id(ordinal),
                        ev.event,
                        window_of(ev.start_time, ev.duration),
                        ev.signaling_urls.clone(),
                    )
                })
                .collect(),
        })
    }
}
