//! Tracking sessions end to end on paused time.

use std::time::Duration;

use beacon_engine::{SessionHandle, TrackingSession};
use contracts::{ClockSample, ContractError, DeliveryState, EventKind, TrackerConfig};
use delivery::DeliveryReport;
use observability::DeliveryAggregator;
use tokio::sync::mpsc;
use tokio::time;

use crate::mocks::*;

const URL: &str = "https://stream.example/live/metadata";

fn config() -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.session.metadata_url = Some(URL.to_string());
    config
}

/// Push samples from `from` to `to` (inclusive) in 500 ms steps of real time
async fn play(handle: &SessionHandle, from: f64, to: f64) {
    let mut position = from;
    while position <= to {
        handle.push_sample(ClockSample::at(position)).await.unwrap();
        time::sleep(Duration::from_millis(500)).await;
        position += 500.0;
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_plays_through_a_break() {
    let source = MockMetadataSource::serving(document((0.0, 120_000.0), vec![standard_break()]));
    let client = MockBeaconClient::new().with_status(&beacon_url("q3"), 404);
    let (tx, mut rx) = mpsc::channel::<DeliveryReport>(64);

    let handle = TrackingSession::from_config(&config(), client, source, Some(tx))
        .unwrap()
        .spawn();

    play(&handle, 8_000.0, 20_000.0).await;
    assert!(handle.report_action(EventKind::Pause).await.unwrap());
    play(&handle, 20_500.0, 42_000.0).await;

    let summary = handle.shutdown().await.unwrap();
    assert_eq!(summary.delivery.dispatched, 7);
    assert_eq!(summary.delivery.points_done, 6);
    assert_eq!(summary.delivery.points_failed, 1);

    let q3 = summary.final_schedule.find_point("q3").unwrap();
    assert_eq!(q3.delivery_state, DeliveryState::Failed);
    let complete = summary.final_schedule.find_point("complete").unwrap();
    assert_eq!(complete.delivery_state, DeliveryState::Done);

    let mut aggregator = DeliveryAggregator::new();
    while let Some(report) = rx.recv().await {
        aggregator.record_request(report.outcome.is_success(), report.latency_ms);
    }
    let totals = aggregator.summary();
    assert_eq!(totals.urls_delivered, 6);
    assert_eq!(totals.urls_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetches_are_retried_on_next_refresh() {
    let source = MockMetadataSource::serving(document((0.0, 120_000.0), vec![standard_break()]))
        .then(Err(ContractError::metadata_fetch(URL, "503")))
        .then(Err(ContractError::metadata_fetch(URL, "503")));

    let handle = TrackingSession::from_config(&config(), MockBeaconClient::new(), source, None)
        .unwrap()
        .spawn();

    // the first refresh fails (plain and anchored attempts alike); the next
    // one, 4 s later, succeeds before the break
    play(&handle, 1_000.0, 12_000.0).await;

    let summary = handle.shutdown().await.unwrap();
    assert_eq!(summary.fetch_failures, 1);
    assert!(summary.documents_accepted >= 1);
    let imp = summary.final_schedule.find_point("imp").unwrap();
    assert_eq!(imp.delivery_state, DeliveryState::Done);
}

#[tokio::test(start_paused = true)]
async fn test_time_jump_triggers_immediate_refetch() {
    let later_break = ad_break(
        "pod-2",
        600_000.0,
        10_000.0,
        vec![ad(
            "ad-2",
            600_000.0,
            10_000.0,
            vec![event("imp-2", EventKind::Impression, 600_000.0, 0.0)],
        )],
    );
    let source = MockMetadataSource::serving(document(
        (500_000.0, 700_000.0),
        vec![later_break],
    ))
    .then(Ok(document((0.0, 120_000.0), vec![standard_break()])));

    let handle = TrackingSession::from_config(&config(), MockBeaconClient::new(), source, None)
        .unwrap()
        .spawn();

    play(&handle, 1_000.0, 2_000.0).await;
    assert!(handle.snapshot().await.unwrap().find_point("imp").is_some());

    // seek far past the first document, outside any break
    play(&handle, 550_000.0, 551_000.0).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.find_point("imp").is_none());
    assert!(snapshot.find_point("imp-2").is_some());

    let summary = handle.shutdown().await.unwrap();
    assert_eq!(summary.ticks.get("reset"), Some(&1));
    assert_eq!(summary.delivery.dispatched, 0);
}

#[tokio::test(start_paused = true)]
async fn test_commands_before_first_sample() {
    let source = MockMetadataSource::serving(document((0.0, 120_000.0), Vec::new()));
    let session =
        TrackingSession::from_config(&config(), MockBeaconClient::new(), source, None).unwrap();
    assert_eq!(session.metadata_url(), URL);

    let handle = session.spawn();
    assert!(!handle.report_action(EventKind::Mute).await.unwrap());
    handle.refresh().await.unwrap();
    let summary = handle.shutdown().await.unwrap();
    assert_eq!(summary.samples, 0);
}
