//! Document -> reconcile -> ticks -> deliveries.

use std::path::Path;

use beacon_engine::{settle_all, BeaconEngine, TickDecision};
use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{
    ClockSample, ContractError, DeliveryState, EventKind, MetadataDocument, SecondaryState,
    SecondaryStatus, TimeRange,
};
use delivery::{BeaconDispatcher, DeliveryOutcome};
use metadata::{accept_checked, fetch_for_position};
use tokio::sync::mpsc;

use crate::mocks::*;

const URL: &str = "https://stream.example/live/metadata";

const WIRE_DOCUMENT: &str = r#"{
    "dataRange": { "start": 0, "end": 120000 },
    "adBreaks": [{
        "id": "pod-1",
        "startTime": 10000,
        "duration": 30000,
        "ads": [{
            "id": "ad-1",
            "startTime": 10000,
            "duration": 30000,
            "trackingEvents": [
                { "event": "impression", "startTime": 10000, "duration": 0,
                  "signalingUrls": ["https://b.example/imp", "https://c.example/imp"] },
                { "event": "creativeView", "startTime": 10000, "duration": 0,
                  "signalingUrls": ["https://b.example/cv"] },
                { "event": "midpoint", "startTime": 25000, "duration": 0,
                  "signalingUrls": ["https://b.example/mid"] },
                { "event": "mute", "startTime": 10000, "duration": 30000,
                  "signalingUrls": ["https://b.example/mute"] }
            ]
        }]
    }]
}"#;

fn engine(client: MockBeaconClient) -> BeaconEngine<MockBeaconClient> {
    BeaconEngine::new(Default::default(), BeaconDispatcher::new(client))
}

#[tokio::test]
async fn test_wire_document_drives_deliveries() {
    let doc: MetadataDocument = serde_json::from_str(WIRE_DOCUMENT).unwrap();
    let accepted = accept_checked(URL, &doc, 8_000.0, 5_000.0).unwrap();

    let (tx, mut rx) = mpsc::channel(32);
    let dispatcher = BeaconDispatcher::new(MockBeaconClient::new()).with_reports(tx);
    let mut engine = BeaconEngine::new(Default::default(), dispatcher);
    engine.apply_document(&accepted);

    // creativeView is not a known kind and never enters the schedule
    assert!(engine
        .snapshot()
        .items
        .iter()
        .flat_map(|i| i.events.iter())
        .flat_map(|e| e.points.iter())
        .all(|p| p.kind != EventKind::Unknown));

    let mut in_flight = Vec::new();
    let mut position = 8_000.0;
    let mut t = 0.0;
    while position <= 30_000.0 {
        engine.record_sample(&ClockSample::at(position));
        in_flight.extend(engine.tick(&ClockSample::at(position), t).dispatched);
        if position == 20_000.0 {
            in_flight.extend(engine.report_action(EventKind::Mute));
        }
        position += 500.0;
        t += 500.0;
    }
    let states = settle_all(in_flight).await;
    assert_eq!(states.len(), 3);
    assert!(states.iter().all(|(_, s)| *s == DeliveryState::Done));

    let mut urls = Vec::new();
    while let Ok(report) = rx.try_recv() {
        assert_eq!(report.outcome, DeliveryOutcome::Delivered { status: 200 });
        urls.push(report.url);
    }
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://b.example/imp",
            "https://b.example/mid",
            "https://b.example/mute",
            "https://c.example/imp",
        ]
    );

    // action points fire once per ad
    assert!(engine.report_action(EventKind::Mute).is_none());
}

#[tokio::test]
async fn test_out_of_range_document_leaves_schedule_alone() {
    let mut engine = engine(MockBeaconClient::new());
    let first = document((0.0, 60_000.0), vec![standard_break()]);
    engine.apply_document(&accept_checked(URL, &first, 0.0, 5_000.0).unwrap());
    let before = engine.snapshot();

    // stale window, and the anchored retry fails
    let stale = document((0.0, 20_000.0), Vec::new());
    let source = MockMetadataSource::default()
        .then(Ok(stale))
        .then(Err(ContractError::metadata_fetch(URL, "timeout")));

    let result = fetch_for_position(&source, URL, 18_000.0, 5_000.0).await;
    assert!(result.is_err());
    assert_eq!(engine.snapshot(), before);
    assert_eq!(
        source.requested(),
        vec![URL.to_string(), format!("{URL}?start=18000")]
    );
}

#[tokio::test]
async fn test_anchored_document_accepted_after_rejection() {
    let stale = document((0.0, 20_000.0), Vec::new());
    let anchored = document((15_000.0, 75_000.0), vec![standard_break()]);
    let source = MockMetadataSource::default()
        .then(Ok(stale))
        .then(Ok(anchored));

    let accepted = fetch_for_position(&source, URL, 18_000.0, 5_000.0)
        .await
        .unwrap();
    assert_eq!(accepted.url, format!("{URL}?start=18000"));
    assert_eq!(accepted.valid_window, TimeRange::new(15_000.0, 75_000.0));
    assert_eq!(accepted.items.len(), 1);
}

#[tokio::test]
async fn test_points_played_during_stall_are_caught_up() {
    let mut engine = engine(MockBeaconClient::new());
    let doc = document((0.0, 100_000.0), vec![standard_break()]);
    engine.apply_document(&accept_checked(URL, &doc, 0.0, 5_000.0).unwrap());

    let mut t = 0.0;
    let mut in_flight = Vec::new();
    for position in [15_000.0, 15_500.0] {
        engine.record_sample(&ClockSample::at(position));
        in_flight.extend(engine.tick(&ClockSample::at(position), t).dispatched);
        t += 500.0;
    }

    // interstitial paused mid-break while the primary clock keeps moving
    let stalled = SecondaryStatus {
        state: SecondaryState::Other,
        stop_time: Some(16_000.0),
        start_time: Some(10_000.0),
        duration: Some(30_000.0),
    };
    let mut position = 16_000.0;
    while position <= 19_000.0 {
        let sample = ClockSample {
            position,
            rate: 1.0,
            secondary: Some(stalled),
        };
        engine.record_sample(&sample);
        let report = engine.tick(&sample, t);
        assert_eq!(report.decision, TickDecision::Suppressed);
        assert!(report.dispatched.is_empty());
        position += 500.0;
        t += 500.0;
    }
    assert!(!engine.missed_ranges().is_empty());

    // playback resumes; q1 (17500) was played while suppressed
    let report = engine.tick(&ClockSample::at(19_500.0), t);
    assert_eq!(report.dispatched_ids(), vec!["q1"]);
    in_flight.extend(report.dispatched);
    settle_all(in_flight).await;

    assert_eq!(engine.dispatcher().client().call_count(&beacon_url("q1")), 1);
    assert!(engine.missed_ranges().is_empty());
}

#[tokio::test]
async fn test_points_played_before_document_are_caught_up() {
    let mut engine = engine(MockBeaconClient::new());
    for position in [17_000.0, 17_500.0, 18_000.0] {
        engine.record_sample(&ClockSample::at(position));
    }

    let doc = document((0.0, 100_000.0), vec![standard_break()]);
    let in_flight = engine.apply_document(&accept_checked(URL, &doc, 18_000.0, 5_000.0).unwrap());
    let states = settle_all(in_flight).await;
    assert_eq!(states, vec![("q1".to_string(), DeliveryState::Done)]);
}

#[tokio::test]
async fn test_jump_away_from_schedule_resets() {
    let mut engine = engine(MockBeaconClient::new());
    let doc = document((0.0, 100_000.0), vec![standard_break()]);
    engine.apply_document(&accept_checked(URL, &doc, 0.0, 5_000.0).unwrap());

    engine.tick(&ClockSample::at(1_000.0), 0.0);
    let report = engine.tick(&ClockSample::at(500_000.0), 500.0);
    assert_eq!(report.decision, TickDecision::Reset);
    assert!(report.refetch_required);
    assert!(engine.schedule().is_empty());
    assert_eq!(engine.valid_window(), None);
}

#[test]
fn test_config_file_to_engine_config() {
    let toml = r#"
        [engine]
        max_speed = 3.0
        min_dispatch_window_ms = 0.0

        [session]
        media_url = "https://cdn.example/live/master.m3u8?token=abc"
        tick_interval_ms = 250
    "#;
    let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
    assert_eq!(config.engine.max_speed, 3.0);
    assert_eq!(config.session.tick_interval_ms, 250);
    assert_eq!(
        beacon_engine::resolve_metadata_url(&config.session).unwrap(),
        "https://cdn.example/live/metadata?token=abc"
    );

    let bad = "[engine]\nnormal_rate_min = 2.0\nnormal_rate_max = 1.0\n";
    assert!(ConfigLoader::load_from_str(bad, ConfigFormat::Toml).is_err());
    assert!(ConfigLoader::load_from_path(Path::new("/nonexistent/tracker.toml")).is_err());
}
