//! TrackingSession - 引擎的唯一持有者
//!
//! 时钟采样、tick、元数据刷新和操作上报都经由同一个任务串行处理，
//! tick 不会看到只应用了一半的调度。停止会话即停止 tick 和采样；
//! 已开始的投递会执行完毕。

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    BeaconClient, ClockSample, ContractError, EventKind, MetadataSource, ScheduleSnapshot,
    SessionConfig, TrackerConfig,
};
use delivery::{BeaconDispatcher, DeliveryReport, InFlight, MetricsSnapshot};
use metadata::{accept_unchecked, fetch_for_position, metadata_url_for, AcceptedDocument};

use crate::engine::{settle_all, BeaconEngine};
use crate::error::EngineError;

/// 配置中的元数据 URL：显式指定，否则由媒体 URL 推导
pub fn resolve_metadata_url(session: &SessionConfig) -> Result<String, EngineError> {
    fn non_empty(u: &Option<String>) -> Option<&str> {
        u.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
    if let Some(url) = non_empty(&session.metadata_url) {
        return Ok(url.to_string());
    }
    match non_empty(&session.media_url) {
        Some(media) => Ok(metadata_url_for(media)?),
        None => Err(EngineError::NoMetadataUrl),
    }
}

enum Command {
    Action {
        kind: EventKind,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<ScheduleSnapshot>,
    },
    Refresh,
}

/// 会话生命周期内的统计
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    /// 按决策统计的 tick 次数
    pub ticks: BTreeMap<String, u64>,
    pub samples: u64,
    pub documents_accepted: u64,
    pub fetch_failures: u64,
    pub delivery: MetricsSnapshot,
    pub final_schedule: ScheduleSnapshot,
}

/// 运行中会话的句柄
pub struct SessionHandle {
    samples: mpsc::Sender<ClockSample>,
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    /// 推送时钟采样，会话处理不及时则等待
    pub async fn push_sample(&self, sample: ClockSample) -> Result<(), EngineError> {
        self.samples
            .send(sample)
            .await
            .map_err(|_| EngineError::SessionClosed)
    }

    /// 上报播放器或用户操作
    ///
    /// 返回是否投递了追踪点。
    pub async fn report_action(&self, kind: EventKind) -> Result<bool, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Action { kind, reply })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)
    }

    /// 当前调度视图
    pub async fn snapshot(&self) -> Result<ScheduleSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)
    }

    /// 立即获取元数据，不等待刷新周期
    pub async fn refresh(&self) -> Result<(), EngineError> {
        self.commands
            .send(Command::Refresh)
            .await
            .map_err(|_| EngineError::SessionClosed)
    }

    /// 停止会话并等待进行中的投递
    pub async fn shutdown(self) -> Result<SessionSummary, EngineError> {
        // 任务已结束时接收端已被丢弃
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| EngineError::SessionPanicked(e.to_string()))
    }
}

/// 持有 [`BeaconEngine`] 及为其提供数据的元数据来源
pub struct TrackingSession<C, S> {
    engine: BeaconEngine<C>,
    source: S,
    metadata_url: String,
    config: SessionConfig,
    summary: SessionSummary,
}

impl<C, S> TrackingSession<C, S>
where
    C: BeaconClient + Send + Sync + 'static,
    S: MetadataSource + Send + Sync + 'static,
{
    pub fn new(
        engine: BeaconEngine<C>,
        source: S,
        metadata_url: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            engine,
            source,
            metadata_url: metadata_url.into(),
            config,
            summary: SessionSummary::default(),
        }
    }

    /// 由配置建立会话
    pub fn from_config(
        config: &TrackerConfig,
        client: C,
        source: S,
        reports: Option<mpsc::Sender<DeliveryReport>>,
    ) -> Result<Self, EngineError> {
        let metadata_url = resolve_metadata_url(&config.session)?;
        let mut dispatcher = BeaconDispatcher::new(client);
        if let Some(tx) = reports {
            dispatcher = dispatcher.with_reports(tx);
        }
        let engine = BeaconEngine::new(config.engine.clone(), dispatcher);
        Ok(Self::new(engine, source, metadata_url, config.session.clone()))
    }

    pub fn metadata_url(&self) -> &str {
        &self.metadata_url
    }

    /// 启动会话任务
    pub fn spawn(self) -> SessionHandle {
        let (samples_tx, samples_rx) = mpsc::channel(64);
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(samples_rx, commands_rx, shutdown_rx));

        SessionHandle {
            samples: samples_tx,
            commands: commands_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    #[instrument(name = "tracking_session_run", skip_all, fields(url = %self.metadata_url))]
    async fn run(
        mut self,
        mut samples: mpsc::Receiver<ClockSample>,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionSummary {
        info!(
            tick_ms = self.config.tick_interval_ms,
            refresh_ms = self.config.refresh_interval_ms,
            "Tracking session started"
        );

        let started = Instant::now();
        let mut tick = time::interval(Duration::from_millis(self.config.tick_interval_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = time::interval(Duration::from_millis(self.config.refresh_interval_ms));
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut latest: Option<ClockSample> = None;
        let mut in_flight: Vec<InFlight> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("Shutdown requested");
                    break;
                }
                sample = samples.recv() => {
                    let Some(sample) = sample else {
                        debug!("Sample channel closed");
                        break;
                    };
                    self.summary.samples += 1;
                    self.engine.record_sample(&sample);
                    latest = Some(sample);
                }
                _ = tick.tick() => {
                    let Some(sample) = latest else {
                        continue;
                    };
                    let now_ms = started.elapsed().as_secs_f64() * 1_000.0;
                    let report = self.engine.tick(&sample, now_ms);
                    *self
                        .summary
                        .ticks
                        .entry(report.decision.as_str().to_string())
                        .or_default() += 1;

                    let refetch = report.refetch_required;
                    in_flight.extend(report.dispatched);
                    if refetch {
                        in_flight.extend(self.refresh().await);
                    }
                    in_flight.retain(|f| !f.is_finished());
                }
                _ = refresh.tick() => {
                    in_flight.extend(self.refresh().await);
                }
                Some(command) = commands.recv() => {
                    match command {
                        Command::Action { kind, reply } => {
                            let flight = self.engine.report_action(kind);
                            let _ = reply.send(flight.is_some());
                            in_flight.extend(flight);
                        }
                        Command::Snapshot { reply } => {
                            let _ = reply.send(self.engine.snapshot());
                        }
                        Command::Refresh => {
                            in_flight.extend(self.refresh().await);
                        }
                    }
                }
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight deliveries");
        }
        settle_all(in_flight).await;

        self.summary.delivery = self.engine.dispatcher().metrics().snapshot();
        self.summary.final_schedule = self.engine.snapshot();
        info!(
            samples = self.summary.samples,
            documents = self.summary.documents_accepted,
            dispatched = self.summary.delivery.dispatched,
            "Tracking session stopped"
        );
        self.summary
    }

    /// 获取并应用当前位置的元数据
    async fn refresh(&mut self) -> Vec<InFlight> {
        match self.fetch().await {
            Ok(document) => {
                let status = if document.url == self.metadata_url {
                    "accepted"
                } else {
                    "anchored"
                };
                observability::record_metadata_fetch(status);
                self.summary.documents_accepted += 1;
                self.engine.apply_document(&document)
            }
            Err(e) => {
                observability::record_metadata_fetch("failed");
                self.summary.fetch_failures += 1;
                if e.is_fetch_error() {
                    warn!(error = %e, "Metadata refresh failed, retrying next interval");
                } else {
                    error!(error = %e, "Metadata refresh failed");
                }
                Vec::new()
            }
        }
    }

    async fn fetch(&self) -> Result<AcceptedDocument, ContractError> {
        let early_fetch = self.engine.config().early_fetch_ms;
        match self.engine.position() {
            Some(position) => {
                fetch_for_position(&self.source, &self.metadata_url, position, early_fetch).await
            }
            // 首个采样之前无位置可供检查
            None => {
                let doc = self.source.fetch(&self.metadata_url).await?;
                accept_unchecked(&self.metadata_url, &doc)
            }
        }
    }
}
