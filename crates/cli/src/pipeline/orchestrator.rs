//! Session orchestrator - wires collaborators, replays the script, collects stats.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_engine::TrackingSession;
use contracts::{BeaconClient, MetadataSource, TrackerConfig};
use delivery::{DeliveryReport, HttpBeaconClient};
use metadata::HttpMetadataSource;
use observability::DeliveryAggregator;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::script::{ScriptEntry, ScriptStep};
use super::SessionStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tracker configuration
    pub config: TrackerConfig,

    /// Timed samples and actions to replay
    pub steps: Vec<ScriptStep>,

    /// Replay speed multiplier
    pub speed: f64,

    /// Replay timeout (None = until the script ends)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run against the real HTTP collaborators
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        let timeout = Duration::from_millis(self.config.config.session.request_timeout_ms);
        let client = HttpBeaconClient::new(timeout).context("Failed to build beacon client")?;
        let source = HttpMetadataSource::new(timeout).context("Failed to build metadata client")?;

        self.run_with(client, source, shutdown).await
    }

    /// Run against the given collaborators
    pub async fn run_with<C, S>(
        self,
        client: C,
        source: S,
        shutdown: impl Future<Output = ()>,
    ) -> Result<SessionStats>
    where
        C: BeaconClient + Send + Sync + 'static,
        S: MetadataSource + Send + Sync + 'static,
    {
        let started = Instant::now();
        let capacity = self.config.config.session.report_queue_capacity;
        let (reports_tx, reports_rx) = mpsc::channel::<DeliveryReport>(capacity);

        let session =
            TrackingSession::from_config(&self.config.config, client, source, Some(reports_tx))
                .context("Failed to create tracking session")?;
        info!(
            metadata_url = %session.metadata_url(),
            steps = self.config.steps.len(),
            speed = self.config.speed,
            "Tracking session configured"
        );

        let collector = tokio::spawn(collect_reports(reports_rx));
        let handle = session.spawn();

        let mut stats = SessionStats::default();
        let script = replay(&handle, &self.config.steps, self.config.speed, &mut stats);

        let finished = tokio::select! {
            result = run_with_timeout(script, self.config.timeout) => result?,
            _ = shutdown => {
                warn!("Received shutdown signal, stopping session...");
                false
            }
        };
        stats.interrupted = !finished;

        info!("Shutting down session...");
        let summary = handle
            .shutdown()
            .await
            .context("Tracking session did not stop cleanly")?;

        // The collector ends once every delivery has released its report sender
        stats.delivery = collector.await.context("Report collector failed")?;
        stats.record_points(&summary.final_schedule);
        stats.session = summary;
        stats.duration = started.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            dispatched = stats.session.delivery.dispatched,
            points_done = stats.session.delivery.points_done,
            points_failed = stats.session.delivery.points_failed,
            "Session shutdown complete"
        );

        Ok(stats)
    }
}

/// `Ok(true)` when the replay ran to the end
async fn run_with_timeout(
    replay: impl Future<Output = Result<()>>,
    timeout: Option<Duration>,
) -> Result<bool> {
    match timeout {
        Some(limit) => match time::timeout(limit, replay).await {
            Ok(result) => result.map(|()| true),
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Replay timed out");
                Ok(false)
            }
        },
        None => replay.await.map(|()| true),
    }
}

async fn replay(
    handle: &beacon_engine::SessionHandle,
    steps: &[ScriptStep],
    speed: f64,
    stats: &mut SessionStats,
) -> Result<()> {
    let start = Instant::now();
    for step in steps {
        time::sleep_until(start + step.at.div_f64(speed)).await;
        match step.entry {
            ScriptEntry::Sample(sample) => {
                handle.push_sample(sample).await?;
                stats.samples_replayed += 1;
            }
            ScriptEntry::Action(kind) => {
                stats.actions_reported += 1;
                if handle.report_action(kind).await? {
                    stats.actions_dispatched += 1;
                    info!(kind = %kind, "Action dispatched");
                } else {
                    debug!(kind = %kind, "Action matched no tracking point");
                }
            }
        }
    }
    info!(steps = steps.len(), "Sample script finished");
    Ok(())
}

async fn collect_reports(mut rx: mpsc::Receiver<DeliveryReport>) -> DeliveryAggregator {
    let mut aggregator = DeliveryAggregator::new();
    while let Some(report) = rx.recv().await {
        debug!(
            point_id = %report.point_id,
            url = %report.url,
            outcome = report.outcome.label(),
            latency_ms = report.latency_ms,
            "Delivery report"
        );
        aggregator.record_request(report.outcome.is_success(), report.latency_ms);
    }
    aggregator
}
