//! 投递计数器

use std::sync::atomic::{AtomicU64, Ordering};

/// 同一 dispatcher 下所有投递共享的计数器
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    /// 认领投递的追踪点数
    dispatched: AtomicU64,
    /// 以 `done` 结束的追踪点数
    points_done: AtomicU64,
    /// 以 `failed` 结束的追踪点数
    points_failed: AtomicU64,
    /// 返回 2xx 的请求数
    urls_delivered: AtomicU64,
    /// 返回其他状态或无响应的请求数
    urls_failed: AtomicU64,
    /// 因报告队列已满而丢弃的报告数
    reports_dropped: AtomicU64,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn points_done(&self) -> u64 {
        self.points_done.load(Ordering::Relaxed)
    }

    pub fn points_failed(&self) -> u64 {
        self.points_failed.load(Ordering::Relaxed)
    }

    /// 统计进入终态的追踪点
    pub fn inc_point(&self, done: bool) {
        if done {
            self.points_done.fetch_add(1, Ordering::Relaxed);
        } else {
            self.points_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn urls_delivered(&self) -> u64 {
        self.urls_delivered.load(Ordering::Relaxed)
    }

    pub fn urls_failed(&self) -> u64 {
        self.urls_failed.load(Ordering::Relaxed)
    }

    /// 统计一次请求结果
    pub fn inc_url(&self, success: bool) {
        if success {
            self.urls_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.urls_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn reports_dropped(&self) -> u64 {
        self.reports_dropped.load(Ordering::Relaxed)
    }

    pub fn inc_reports_dropped(&self) {
        self.reports_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched(),
            points_done: self.points_done(),
            points_failed: self.points_failed(),
            urls_delivered: self.urls_delivered(),
            urls_failed: self.urls_failed(),
            reports_dropped: self.reports_dropped(),
        }
    }
}

/// 计数器的时间点快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub points_done: u64,
    pub points_failed: u64,
    pub urls_delivered: u64,
    pub urls_failed: u64,
    pub reports_dropped: u64,
}
