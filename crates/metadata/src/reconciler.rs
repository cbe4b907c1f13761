//! 调度合并
//!
//! 将新获取的调度合并进本地调度。每一层（时段、广告、追踪点）
//! 执行相同的合并，按 id 匹配：
//!
//! 1. 丢弃不在新文档中、且结束时间早于 `now` 超过
//!    `retention_ms` 的本地节点
//! 2. 原地更新匹配节点（仅窗口），其余新建
//! 3. 递归处理子节点
//! 4. 按窗口起点稳定排序
//!
//! 匹配的节点保留其子节点，追踪点的投递状态在任意次重新获取后都不会丢失。
//! 未知类型的追踪点不会进入调度。

use std::collections::HashSet;

use contracts::{AdEvent, EventKind, ScheduleItem, TimeRange, TrackingPoint};
use tracing::{debug, instrument};

/// 将 `fetched` 合并进 `current`，返回新调度
#[instrument(
    name = "metadata_reconcile",
    level = "debug",
    skip(current, fetched),
    fields(current = current.len(), fetched = fetched.len())
)]
pub fn reconcile(
    current: Vec<ScheduleItem>,
    fetched: &[ScheduleItem],
    now: f64,
    retention_ms: f64,
) -> Vec<ScheduleItem> {
    merge_level(current, fetched, now, retention_ms)
}

/// 可被合并遍历的调度节点
trait Node: Sized {
    fn id(&self) -> &str;
    fn window(&self) -> Option<TimeRange>;
    fn set_window(&mut self, window: TimeRange);
    /// 带有 `fetched` 标识的空节点
    fn fresh(fetched: &Self) -> Self;
    fn merge_children(&mut self, fetched: &Self, now: f64, retention_ms: f64);
    /// `fetched` 是否允许进入调度
    fn admissible(&self) -> bool {
        true
    }
}

fn merge_level<T: Node>(current: Vec<T>, fetched: &[T], now: f64, retention_ms: f64) -> Vec<T> {
    let fetched: Vec<&T> = fetched.iter().filter(|n| n.admissible()).collect();
    let fetched_ids: HashSet<&str> = fetched.iter().map(|n| n.id()).collect();

    let mut merged: Vec<T> = current
        .into_iter()
        .filter(|node| {
            let keep = fetched_ids.contains(node.id()) || !expired(node.window(), now, retention_ms);
            if !keep {
                debug!(id = node.id(), "Dropping expired node");
            }
            keep
        })
        .collect();

    for incoming in fetched {
        let index = match merged.iter().position(|n| n.id() == incoming.id()) {
            Some(index) => index,
            None => {
                merged.push(T::fresh(incoming));
                merged.len() - 1
            }
        };
        let node = &mut merged[index];
        if let Some(window) = incoming.window() {
            node.set_window(window);
        }
        node.merge_children(incoming, now, retention_ms);
    }

    merged.sort_by(|a, b| sort_key(a.window()).total_cmp(&sort_key(b.window())));
    merged
}

/// 没有窗口的节点无法定位时间，缺席即被移除
fn expired(window: Option<TimeRange>, now: f64, retention_ms: f64) -> bool {
    match window {
        Some(w) => w.end + retention_ms < now,
        None => true,
    }
}

fn sort_key(window: Option<TimeRange>) -> f64 {
    window.map_or(f64::INFINITY, |w| w.start)
}

impl Node for ScheduleItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn window(&self) -> Option<TimeRange> {
        self.window
    }

    fn set_window(&mut self, window: TimeRange) {
        self.window = Some(window);
    }

    fn fresh(fetched: &Self) -> Self {
        ScheduleItem {
            id: fetched.id.clone(),
            window: None,
            events: Vec::new(),
        }
    }

    fn merge_children(&mut self, fetched: &Self, now: f64, retention_ms: f64) {
        let events = std::mem::take(&mut self.events);
        self.events = merge_level(events, &fetched.events, now, retention_ms);
    }
}

impl Node for AdEvent {
    fn id(&self) -> &str {
        &self.id
    }

    fn window(&self) -> Option<TimeRange> {
        self.window
    }

    fn set_window(&mut self, window: TimeRange) {
        self.window = Some(window);
    }

    fn fresh(fetched: &Self) -> Self {
        AdEvent {
            id: fetched.id.clone(),
            window: None,
            tracking_points: Vec::new(),
        }
    }

    fn merge_children(&mut self, fetched: &Self, now: f64, retention_ms: f64) {
        let points = std::mem::take(&mut self.tracking_points);
        self.tracking_points = merge_level(points, &fetched.tracking_points, now, retention_ms);
    }
}

impl Node for TrackingPoint {
    fn id(&self) -> &str {
        &self.id
    }

    fn window(&self) -> Option<TimeRange> {
        self.window
    }

    fn set_window(&mut self, window: TimeRange) {
        self.window = Some(window);
    }

    fn fresh(fetched: &Self) -> Self {
        TrackingPoint::new(
            fetched.id.clone(),
            fetched.kind,
            None,
            fetched.callback_urls.clone(),
        )
    }

    fn merge_children(&mut self, _fetched: &Self, _now: f64, _retention_ms: f64) {}

    fn admissible(&self) -> bool {
        self.kind != EventKind::Unknown
    }
}
