//! Beacon 调度引擎
//!
//! 持有调度、已播放区间追踪器和上一个时钟采样。每次 tick 比较前后两个位置，
//! 找出到期的时钟驱动追踪点；补发流程则投递那些在时钟不可信或缺少元数据
//! 覆盖期间已被播放过的追踪点。

use contracts::{
    point_count, BeaconClient, ClockSample, DeliveryState, EngineConfig, EventKind, ScheduleItem,
    ScheduleSnapshot, TimeRange, TrackingPoint,
};
use delivery::{BeaconDispatcher, InFlight};
use metadata::{reconcile, AcceptedDocument};
use tracing::{debug, info, instrument, warn};

use crate::played_range::PlayedRangeTracker;
use crate::suppression::SuppressionPolicy;

/// tick 的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// 首个采样；尚无可比较对象
    Primed,
    /// 采样时间与上次 tick 相同；忽略
    Duplicate,
    /// 已执行到期扫描
    Scanned,
    /// 速度不在 `[0, max_speed]` 内；跳过到期扫描
    RateGated,
    /// 次级内容在时段中途停滞；跳过所有扫描
    Suppressed,
    /// 位置跳离调度；已清空调度
    Reset,
}

impl TickDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primed => "primed",
            Self::Duplicate => "duplicate",
            Self::Scanned => "scanned",
            Self::RateGated => "rate_gated",
            Self::Suppressed => "suppressed",
            Self::Reset => "reset",
        }
    }
}

/// 单次 tick 的结果
#[derive(Debug)]
pub struct TickReport {
    pub decision: TickDecision,
    /// 本次 tick 发起的投递
    pub dispatched: Vec<InFlight>,
    /// 调度已清空，需要重新获取
    pub refetch_required: bool,
}

impl TickReport {
    fn new(decision: TickDecision) -> Self {
        Self {
            decision,
            dispatched: Vec::new(),
            refetch_required: false,
        }
    }

    /// 本次 tick 投递的追踪点 id
    pub fn dispatched_ids(&self) -> Vec<&str> {
        self.dispatched.iter().map(InFlight::point_id).collect()
    }

    /// 等待本次 tick 发起的所有投递
    pub async fn settle(self) -> Vec<(String, DeliveryState)> {
        settle_all(self.dispatched).await
    }
}

/// 等待投递完成并收集终态
pub async fn settle_all(in_flight: Vec<InFlight>) -> Vec<(String, DeliveryState)> {
    let mut states = Vec::with_capacity(in_flight.len());
    for flight in in_flight {
        let id = flight.point_id().to_string();
        match flight.wait().await {
            Ok(state) => states.push((id, state)),
            Err(e) => warn!(point_id = %id, error = %e, "Delivery did not finish"),
        }
    }
    states
}

#[derive(Debug, Clone, Copy)]
struct LastTick {
    position: f64,
    sample_time: f64,
}

/// Beacon 调度引擎
pub struct BeaconEngine<C> {
    config: EngineConfig,
    dispatcher: BeaconDispatcher<C>,
    suppression: SuppressionPolicy,
    schedule: Vec<ScheduleItem>,
    /// 最近接收文档的有效区间
    valid_window: Option<TimeRange>,
    /// 正常速率下观测到的位置
    played: PlayedRangeTracker,
    /// tick 扫描未能使用的已播放位置
    missed: PlayedRangeTracker,
    last_tick: Option<LastTick>,
    /// 采样或 tick 得到的最新位置
    position: Option<f64>,
}

impl<C> BeaconEngine<C>
where
    C: BeaconClient + Send + Sync + 'static,
{
    pub fn new(config: EngineConfig, dispatcher: BeaconDispatcher<C>) -> Self {
        let tolerance = config.played_tolerance_ms();
        Self {
            suppression: SuppressionPolicy::new(config.secondary_tolerance_ms),
            played: PlayedRangeTracker::new(tolerance),
            missed: PlayedRangeTracker::new(tolerance),
            config,
            dispatcher,
            schedule: Vec::new(),
            valid_window: None,
            last_tick: None,
            position: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &BeaconDispatcher<C> {
        &self.dispatcher
    }

    pub fn schedule(&self) -> &[ScheduleItem] {
        &self.schedule
    }

    pub fn valid_window(&self) -> Option<TimeRange> {
        self.valid_window
    }

    pub fn position(&self) -> Option<f64> {
        self.position
    }

    /// 调度的只读视图
    pub fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot::capture(&self.schedule)
    }

    /// `position` 是否在正常播放速率下被观测到
    pub fn was_played(&self, position: f64) -> bool {
        self.played.was_played(position)
    }

    pub fn played_ranges(&self) -> &[TimeRange] {
        self.played.ranges()
    }

    /// 尚未被补发流程消费的已播放区间
    pub fn missed_ranges(&self) -> &[TimeRange] {
        self.missed.ranges()
    }

    /// 将位置采样写入已播放区间追踪器
    ///
    /// 只有正常速率的采样计为已播放。时钟被抑制或位于最新有效区间之外时的采样
    /// 同时保留用于补发。
    #[instrument(
        name = "beacon_engine_record_sample",
        level = "trace",
        skip(self, sample),
        fields(position = sample.position, rate = sample.rate)
    )]
    pub fn record_sample(&mut self, sample: &ClockSample) {
        self.position = Some(sample.position);

        if sample.rate < self.config.normal_rate_min || sample.rate > self.config.normal_rate_max {
            return;
        }
        self.played.track(sample.position);

        let covered = self
            .valid_window
            .is_some_and(|w| w.contains(sample.position));
        if !covered || self.is_suppressed(sample) {
            self.missed.track(sample.position);
        }
        observability::record_played_ranges(self.played.len());
    }

    /// 执行一次 tick
    ///
    /// `sample_time_ms` 为采样时的墙钟时间；只有 tick 之间的差值有意义。
    #[instrument(
        name = "beacon_engine_tick",
        level = "trace",
        skip(self, sample),
        fields(position = sample.position)
    )]
    pub fn tick(&mut self, sample: &ClockSample, sample_time_ms: f64) -> TickReport {
        let position = sample.position;

        if let Some(last) = self.last_tick {
            if last.sample_time == sample_time_ms {
                observability::record_tick(TickDecision::Duplicate.as_str());
                return TickReport::new(TickDecision::Duplicate);
            }
            if self.is_time_jump(last.position, position) {
                info!(
                    from = last.position,
                    to = position,
                    items = self.schedule.len(),
                    "Time jump away from schedule, resetting"
                );
                self.reset();
                self.finish_tick(position, sample_time_ms, TickDecision::Reset);
                let mut report = TickReport::new(TickDecision::Reset);
                report.refetch_required = true;
                return report;
            }
        }

        let suppressed = self.is_suppressed(sample);
        let mut report = match self.last_tick {
            None => TickReport::new(TickDecision::Primed),
            Some(_) if suppressed => TickReport::new(TickDecision::Suppressed),
            Some(last) => {
                let speed = (position - last.position) / (sample_time_ms - last.sample_time);
                if !(0.0..=self.config.max_speed).contains(&speed) {
                    debug!(speed, "Discontinuity, skipping due-point scan");
                    TickReport::new(TickDecision::RateGated)
                } else {
                    let mut report = TickReport::new(TickDecision::Scanned);
                    report.dispatched = self.scan_due(TimeRange::new(last.position, position));
                    report
                }
            }
        };

        if !suppressed {
            report.dispatched.extend(self.catch_up());
        }

        self.finish_tick(position, sample_time_ms, report.decision);
        report
    }

    /// 将已接收文档合并进调度，然后补发
    #[instrument(
        name = "beacon_engine_apply_document",
        skip(self, document),
        fields(url = %document.url, items = document.items.len())
    )]
    pub fn apply_document(&mut self, document: &AcceptedDocument) -> Vec<InFlight> {
        self.apply_schedule(&document.items, document.valid_window)
    }

    /// 合并对 `valid_window` 有效的调度节点，然后补发
    pub fn apply_schedule(&mut self, fetched: &[ScheduleItem], valid_window: TimeRange) -> Vec<InFlight> {
        let now = self.position.unwrap_or(valid_window.start);
        let current = std::mem::take(&mut self.schedule);
        self.schedule = reconcile(current, fetched, now, self.config.retention_ms);
        self.valid_window = Some(valid_window);

        let points = point_count(&self.schedule);
        observability::record_schedule_points(points);
        debug!(
            items = self.schedule.len(),
            points,
            window = %valid_window,
            "Schedule updated"
        );

        self.catch_up()
    }

    /// 在当前位置所在广告中投递 `kind` 类型的操作驱动追踪点
    ///
    /// 当前没有广告播放、广告中没有该类型的 idle 追踪点，
    /// 或 `kind` 为时钟驱动类型时返回 `None`。
    #[instrument(name = "beacon_engine_report_action", skip(self))]
    pub fn report_action(&mut self, kind: EventKind) -> Option<InFlight> {
        if !kind.is_action_driven() {
            warn!(%kind, "Only action-driven kinds can be reported");
            return None;
        }
        let position = self.position?;
        let tol = self.config.end_tolerance_ms;

        let ad = self
            .schedule
            .iter()
            .flat_map(|item| item.events.iter())
            .find(|ad| {
                ad.window
                    .is_some_and(|w| w.padded(0.0, tol).contains(position))
            });
        let Some(ad) = ad else {
            debug!(position, "No ad playing");
            return None;
        };

        let point = ad
            .tracking_points
            .iter()
            .find(|p| p.kind == kind && p.delivery_state() == DeliveryState::Idle)?;
        self.dispatcher.dispatch(point)
    }

    /// 清空调度、覆盖范围和有效区间
    pub fn reset(&mut self) {
        self.schedule.clear();
        self.valid_window = None;
        self.played.reset();
        self.missed.reset();
        observability::record_schedule_points(0);
        observability::record_played_ranges(0);
    }

    fn finish_tick(&mut self, position: f64, sample_time_ms: f64, decision: TickDecision) {
        self.last_tick = Some(LastTick {
            position,
            sample_time: sample_time_ms,
        });
        self.position = Some(position);

        let retention = self.config.played_retention_ms;
        self.played.cleanup(position, retention);
        self.missed.cleanup(position, retention);
        observability::record_tick(decision.as_str());
    }

    fn is_suppressed(&self, sample: &ClockSample) -> bool {
        self.suppression
            .is_suppressed(sample, self.in_stored_items(sample.position))
    }

    /// 位置位于已存储时段内（含起止补偿）
    fn in_stored_items(&self, position: f64) -> bool {
        let before = self.config.time_jump_start_tolerance_ms;
        let after = self.config.end_tolerance_ms;
        self.schedule.iter().any(|item| {
            item.window
                .is_some_and(|w| w.padded(before, after).contains(position))
        })
    }

    fn is_time_jump(&self, from: f64, to: f64) -> bool {
        !self.schedule.is_empty()
            && (to - from).abs() > self.config.time_jump_reset_ms
            && !self.in_stored_items(from)
    }

    /// tick 可触发 `point` 的窗口
    fn dispatch_window(&self, point: &TrackingPoint) -> Option<TimeRange> {
        let w = point.window?;
        let length = w.duration().max(self.config.min_dispatch_window_ms);
        Some(TimeRange::new(
            w.start - self.config.pre_roll_tolerance_ms,
            w.start + length,
        ))
    }

    fn is_candidate(point: &TrackingPoint) -> bool {
        point.kind.is_clock_driven() && point.delivery_state() == DeliveryState::Idle
    }

    fn scan_due(&self, tick: TimeRange) -> Vec<InFlight> {
        let tol = self.config.end_tolerance_ms;
        let overlaps = |window: Option<TimeRange>| {
            window.is_some_and(|w| w.padded(0.0, tol).overlaps(&tick))
        };

        let mut dispatched = Vec::new();
        for item in self.schedule.iter().filter(|i| overlaps(i.window)) {
            for ad in item.events.iter().filter(|e| overlaps(e.window)) {
                for point in &ad.tracking_points {
                    if !Self::is_candidate(point) {
                        continue;
                    }
                    let due = self
                        .dispatch_window(point)
                        .is_some_and(|w| w.overlaps(&tick));
                    if due {
                        dispatched.extend(self.dispatcher.dispatch(point));
                    }
                }
            }
        }
        dispatched
    }

    /// 投递有效区间内被遗漏区间覆盖的 idle 追踪点
    fn catch_up(&mut self) -> Vec<InFlight> {
        let Some(window) = self.valid_window else {
            return Vec::new();
        };
        let spans = self.missed.consume_within(&window);
        if spans.is_empty() {
            return Vec::new();
        }

        let mut dispatched = Vec::new();
        for point in self.schedule.iter().flat_map(|item| item.points()) {
            if !Self::is_candidate(point) {
                continue;
            }
            let covered = self
                .dispatch_window(point)
                .is_some_and(|w| spans.iter().any(|s| s.overlaps(&w)));
            if covered {
                dispatched.extend(self.dispatcher.dispatch(point));
            }
        }

        if !dispatched.is_empty() {
            info!(
                spans = spans.len(),
                dispatched = dispatched.len(),
                "Caught up on missed points"
            );
        }
        dispatched
    }
}
