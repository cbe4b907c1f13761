//! BeaconDispatcher - 认领追踪点并投递到每个回调 URL

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use contracts::{BeaconClient, DeliveryCell, DeliveryState, EventKind, TrackingPoint};

use crate::error::DeliveryError;
use crate::metrics::DeliveryMetrics;
use crate::report::{DeliveryOutcome, DeliveryReport};

/// 投递任务所需的全部数据，与调度树分离
struct Job {
    point_id: String,
    kind: EventKind,
    urls: Vec<String>,
    cell: Arc<DeliveryCell>,
}

/// 进行中投递的句柄
///
/// 丢弃句柄不会取消投递。
#[derive(Debug)]
pub struct InFlight {
    point_id: String,
    kind: EventKind,
    handle: JoinHandle<DeliveryState>,
}

impl InFlight {
    pub fn point_id(&self) -> &str {
        &self.point_id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待追踪点进入终态
    pub async fn wait(self) -> Result<DeliveryState, DeliveryError> {
        self.handle
            .await
            .map_err(|e| DeliveryError::aborted(self.point_id, e.to_string()))
    }
}

/// 通过 [`BeaconClient`] 投递追踪点
pub struct BeaconDispatcher<C> {
    client: Arc<C>,
    metrics: Arc<DeliveryMetrics>,
    reports: Option<mpsc::Sender<DeliveryReport>>,
}

impl<C> Clone for BeaconDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            metrics: Arc::clone(&self.metrics),
            reports: self.reports.clone(),
        }
    }
}

impl<C> BeaconDispatcher<C>
where
    C: BeaconClient + Send + Sync + 'static,
{
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            metrics: Arc::new(DeliveryMetrics::new()),
            reports: None,
        }
    }

    /// 每个请求在 `tx` 上发布一条 [`DeliveryReport`]
    ///
    /// 使用 `try_send` 发送；队列满时丢弃报告。
    pub fn with_reports(mut self, tx: mpsc::Sender<DeliveryReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn metrics(&self) -> &Arc<DeliveryMetrics> {
        &self.metrics
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// 认领 `point` 并开始投递
    ///
    /// 追踪点已离开 `idle` 时返回 `None`。认领在返回前完成；请求在派生的
    /// 任务中执行，因此必须在 tokio runtime 内调用。
    #[instrument(
        name = "beacon_dispatch",
        level = "debug",
        skip(self, point),
        fields(point_id = %point.id, kind = %point.kind)
    )]
    pub fn dispatch(&self, point: &TrackingPoint) -> Option<InFlight> {
        if !point.delivery().try_begin() {
            debug!(state = %point.delivery_state(), "Point not idle, skipped");
            return None;
        }
        self.metrics.inc_dispatched();

        let job = Job {
            point_id: point.id.clone(),
            kind: point.kind,
            urls: point.callback_urls.clone(),
            cell: Arc::clone(point.delivery()),
        };

        let handle = tokio::spawn(deliver(
            Arc::clone(&self.client),
            job,
            Arc::clone(&self.metrics),
            self.reports.clone(),
        ));

        Some(InFlight {
            point_id: point.id.clone(),
            kind: point.kind,
            handle,
        })
    }
}

/// 并发请求所有 URL，然后记录最差结果
async fn deliver<C>(
    client: Arc<C>,
    job: Job,
    metrics: Arc<DeliveryMetrics>,
    reports: Option<mpsc::Sender<DeliveryReport>>,
) -> DeliveryState
where
    C: BeaconClient + Send + Sync + 'static,
{
    let mut requests = JoinSet::new();
    for url in &job.urls {
        let client = Arc::clone(&client);
        let url = url.clone();
        requests.spawn(async move {
            let started = Instant::now();
            let outcome = match client.send(&url).await {
                Ok(status) => DeliveryOutcome::from_status(status),
                Err(e) => DeliveryOutcome::Transport {
                    message: e.to_string(),
                },
            };
            (url, outcome, started.elapsed().as_secs_f64() * 1_000.0)
        });
    }

    let mut all_delivered = true;
    while let Some(joined) = requests.join_next().await {
        let (url, outcome, latency_ms) = match joined {
            Ok(result) => result,
            Err(e) => {
                all_delivered = false;
                error!(point_id = %job.point_id, error = %e, "Beacon request task failed");
                continue;
            }
        };

        let success = outcome.is_success();
        all_delivered &= success;
        metrics.inc_url(success);
        observability::record_beacon(job.kind.as_str(), outcome.label());
        observability::record_delivery_latency_ms(latency_ms);

        if !success {
            warn!(
                point_id = %job.point_id,
                kind = %job.kind,
                url = %url,
                outcome = ?outcome,
                "Beacon request failed"
            );
        }

        publish(
            &reports,
            &metrics,
            DeliveryReport {
                point_id: job.point_id.clone(),
                kind: job.kind,
                url,
                outcome,
                latency_ms,
            },
        );
    }

    let state = job.cell.complete(all_delivered);
    metrics.inc_point(state == DeliveryState::Done);
    info!(
        point_id = %job.point_id,
        kind = %job.kind,
        urls = job.urls.len(),
        state = %state,
        "Tracking point delivered"
    );
    state
}

fn publish(
    reports: &Option<mpsc::Sender<DeliveryReport>>,
    metrics: &DeliveryMetrics,
    report: DeliveryReport,
) {
    let Some(tx) = reports else {
        return;
    };
    match tx.try_send(report) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(r)) => {
            metrics.inc_reports_dropped();
            warn!(point_id = %r.point_id, url = %r.url, "Report queue full, report dropped");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Report receiver closed");
        }
    }
}
