//! Behavioural properties of the schedule, engine and delivery.

use beacon_engine::{BeaconEngine, PlayedRangeTracker, TickDecision};
use contracts::{
    ClockSample, DeliveryState, EngineConfig, EventKind, ScheduleItem, TimeRange,
};
use delivery::BeaconDispatcher;
use metadata::{accept_unchecked, reconcile};

use crate::mocks::*;

const URL: &str = "https://stream.example/live/metadata";

fn engine(config: EngineConfig, client: MockBeaconClient) -> BeaconEngine<MockBeaconClient> {
    BeaconEngine::new(config, BeaconDispatcher::new(client))
}

fn state(engine: &BeaconEngine<MockBeaconClient>, id: &str) -> DeliveryState {
    engine
        .snapshot()
        .find_point(id)
        .map(|p| p.delivery_state)
        .unwrap_or_else(|| panic!("point {id} not in schedule"))
}

fn items(doc: &contracts::MetadataDocument) -> Vec<ScheduleItem> {
    accept_unchecked(URL, doc).unwrap().items
}

#[tokio::test]
async fn test_reconciling_twice_keeps_delivery_states() {
    let doc = document((0.0, 100_000.0), vec![standard_break()]);
    let mut engine = engine(EngineConfig::default(), MockBeaconClient::new());
    engine.apply_document(&accept_unchecked(URL, &doc).unwrap());

    engine.tick(&ClockSample::at(9_500.0), 0.0);
    engine.tick(&ClockSample::at(10_000.0), 500.0).settle().await;
    let after_first = engine.snapshot();

    let caught_up = engine.apply_document(&accept_unchecked(URL, &doc).unwrap());
    assert!(caught_up.is_empty());
    assert_eq!(engine.snapshot(), after_first);
    assert_eq!(state(&engine, "imp"), DeliveryState::Done);
    assert_eq!(state(&engine, "mid"), DeliveryState::Idle);
}

#[tokio::test]
async fn test_done_point_survives_refetch_with_new_duration() {
    let doc = document((0.0, 100_000.0), vec![standard_break()]);
    let mut engine = engine(EngineConfig::default(), MockBeaconClient::new());
    engine.apply_document(&accept_unchecked(URL, &doc).unwrap());
    engine.tick(&ClockSample::at(9_500.0), 0.0);
    engine.tick(&ClockSample::at(10_000.0), 500.0).settle().await;
    assert_eq!(state(&engine, "start"), DeliveryState::Done);

    let mut changed = doc.clone();
    changed.ad_breaks[0].ads[0].tracking_events[1].duration = Some(750.0);
    engine.apply_document(&accept_unchecked(URL, &changed).unwrap());

    let snapshot = engine.snapshot();
    let start = snapshot.find_point("start").unwrap();
    assert_eq!(start.delivery_state, DeliveryState::Done);
    assert_eq!(start.window, Some(TimeRange::new(10_000.0, 10_750.0)));
}

#[tokio::test]
async fn test_increasing_positions_dispatch_each_point_once() {
    let doc = document((0.0, 100_000.0), vec![standard_break()]);
    let mut engine = engine(EngineConfig::default(), MockBeaconClient::new());
    engine.apply_document(&accept_unchecked(URL, &doc).unwrap());

    let mut fired: Vec<String> = Vec::new();
    let mut position = 8_000.0;
    let mut t = 0.0;
    while position <= 42_000.0 {
        let report = engine.tick(&ClockSample::at(position), t);
        fired.extend(report.dispatched_ids().into_iter().map(String::from));
        report.settle().await;
        position += 500.0;
        t += 500.0;
    }

    assert_eq!(fired, vec!["imp", "start", "q1", "mid", "q3", "complete"]);
    let client = engine.dispatcher().client();
    for id in ["imp", "start", "q1", "mid", "q3", "complete"] {
        assert_eq!(client.call_count(&beacon_url(id)), 1, "{id}");
        assert_eq!(state(&engine, id), DeliveryState::Done);
    }
    assert_eq!(client.call_count(&beacon_url("pause")), 0);
}

fn boundary_engine() -> BeaconEngine<MockBeaconClient> {
    let config = EngineConfig {
        min_dispatch_window_ms: 0.0,
        ..EngineConfig::default()
    };
    let doc = document(
        (0.0, 100_000.0),
        vec![ad_break(
            "pod",
            10_000.0,
            0.0,
            vec![ad(
                "ad",
                10_000.0,
                0.0,
                vec![event("edge", EventKind::Impression, 10_000.0, 0.0)],
            )],
        )],
    );
    let mut engine = engine(config, MockBeaconClient::new());
    engine.apply_schedule(&items(&doc), TimeRange::new(0.0, 100_000.0));
    engine
}

#[tokio::test]
async fn test_zero_length_point_fires_on_inclusive_boundary() {
    let mut engine = boundary_engine();
    engine.tick(&ClockSample::at(9_999.0), 0.0);
    let report = engine.tick(&ClockSample::at(10_001.0), 2.0);
    assert_eq!(report.dispatched_ids(), vec!["edge"]);
    report.settle().await;
}

#[tokio::test]
async fn test_zero_length_point_missed_after_boundary() {
    let mut engine = boundary_engine();
    engine.tick(&ClockSample::at(10_001.0), 0.0);
    let report = engine.tick(&ClockSample::at(10_002.0), 1.0);
    assert_eq!(report.decision, TickDecision::Scanned);
    assert!(report.dispatched.is_empty());
    assert_eq!(state(&engine, "edge"), DeliveryState::Idle);
}

#[tokio::test]
async fn test_rate_gate_blocks_seek_scan() {
    // A long break keeps the jump from counting as a schedule reset
    let doc = document(
        (0.0, 300_000.0),
        vec![ad_break(
            "long",
            0.0,
            200_000.0,
            vec![ad(
                "ad",
                0.0,
                200_000.0,
                vec![event("mid", EventKind::Midpoint, 50_000.0, 0.0)],
            )],
        )],
    );
    let mut engine = engine(EngineConfig::default(), MockBeaconClient::new());
    engine.apply_schedule(&items(&doc), TimeRange::new(0.0, 300_000.0));

    engine.tick(&ClockSample::at(1_000.0), 0.0);
    let report = engine.tick(&ClockSample::at(100_000.0), 1_000.0);
    assert_eq!(report.decision, TickDecision::RateGated);
    assert!(report.dispatched.is_empty());
    assert_eq!(state(&engine, "mid"), DeliveryState::Idle);
}

#[test]
fn test_played_ranges_coalesce() {
    let mut tracker = PlayedRangeTracker::new(1_000.0);
    for p in [0.0, 500.0, 1_000.0, 1_500.0] {
        tracker.track(p);
    }
    assert_eq!(tracker.ranges(), &[TimeRange::new(0.0, 1_500.0)]);

    let mut tracker = PlayedRangeTracker::new(1_000.0);
    tracker.track(0.0);
    tracker.track(20_000.0);
    assert_eq!(
        tracker.ranges(),
        &[TimeRange::point(0.0), TimeRange::point(20_000.0)]
    );
    assert!(tracker.was_played(20_000.0));
    assert!(!tracker.was_played(10_000.0));
}

#[test]
fn test_retention_of_absent_items() {
    let doc = document(
        (0.0, 60_000.0),
        vec![ad_break("old", 20_000.0, 10_000.0, Vec::new())],
    );
    let current = reconcile(Vec::new(), &items(&doc), 20_000.0, 10_000.0);

    let kept = reconcile(current.clone(), &[], 35_000.0, 10_000.0);
    assert_eq!(kept.len(), 1);

    let removed = reconcile(current, &[], 50_000.0, 10_000.0);
    assert!(removed.is_empty());
}

#[tokio::test]
async fn test_one_failing_url_fails_the_point() {
    let mut doc = document((0.0, 100_000.0), vec![standard_break()]);
    let imp = &mut doc.ad_breaks[0].ads[0].tracking_events[0];
    imp.signaling_urls = vec![
        "https://ok.example/imp".to_string(),
        "https://broken.example/imp".to_string(),
    ];
    let client = MockBeaconClient::new()
        .with_status("https://ok.example/imp", 200)
        .with_status("https://broken.example/imp", 500);
    let mut engine = engine(EngineConfig::default(), client);
    engine.apply_document(&accept_unchecked(URL, &doc).unwrap());

    engine.tick(&ClockSample::at(9_500.0), 0.0);
    let states = engine.tick(&ClockSample::at(10_000.0), 500.0).settle().await;

    assert!(states.contains(&("imp".to_string(), DeliveryState::Failed)));
    assert!(states.contains(&("start".to_string(), DeliveryState::Done)));
    assert_eq!(engine.dispatcher().client().calls().len(), 3);
    assert_eq!(state(&engine, "imp"), DeliveryState::Failed);
}

#[tokio::test]
async fn test_failed_point_is_never_retried() {
    let doc = document((0.0, 100_000.0), vec![standard_break()]);
    let client = MockBeaconClient::new().unreachable(&beacon_url("imp"));
    let mut engine = engine(EngineConfig::default(), client);
    engine.apply_document(&accept_unchecked(URL, &doc).unwrap());

    engine.tick(&ClockSample::at(9_500.0), 0.0);
    engine.tick(&ClockSample::at(10_000.0), 500.0).settle().await;
    assert_eq!(state(&engine, "imp"), DeliveryState::Failed);

    // refetch, seek back over the point and play through it again
    engine.apply_document(&accept_unchecked(URL, &doc).unwrap());
    engine.tick(&ClockSample::at(9_000.0), 1_000.0);
    engine.tick(&ClockSample::at(9_500.0), 1_500.0);
    engine.tick(&ClockSample::at(10_000.0), 2_000.0).settle().await;

    assert_eq!(engine.dispatcher().client().call_count(&beacon_url("imp")), 1);
    assert_eq!(state(&engine, "imp"), DeliveryState::Failed);
}

/// Wire document without ids; quartiles derive from the ad duration
fn unnamed_wire_document(duration: f64) -> contracts::MetadataDocument {
    let json = format!(
        r#"{{
        "dataRange": {{ "start": 0, "end": 120000 }},
        "adBreaks": [{{
            "startTime": 10000,
            "duration": {duration},
            "ads": [{{
                "startTime": 10000,
                "duration": {duration},
                "trackingEvents": [
                    {{ "event": "impression", "startTime": 10000, "duration": 0,
                       "signalingUrls": ["https://t.example/imp"] }},
                    {{ "event": "midpoint", "startTime": {mid}, "duration": 0,
                       "signalingUrls": ["https://t.example/mid"] }},
                    {{ "event": "complete", "startTime": {end}, "duration": 0,
                       "signalingUrls": ["https://t.example/done"] }}
                ]
            }}]
        }}]
    }}"#,
        mid = 10_000.0 + duration / 2.0,
        end = 10_000.0 + duration,
    );
    serde_json::from_str(&json).unwrap()
}

#[tokio::test]
async fn test_corrected_duration_does_not_refire_unnamed_points() {
    let mut engine = engine(EngineConfig::default(), MockBeaconClient::new());
    engine.apply_document(&accept_unchecked(URL, &unnamed_wire_document(30_000.0)).unwrap());

    let mut position = 8_000.0;
    let mut t = 0.0;
    while position <= 25_500.0 {
        engine.tick(&ClockSample::at(position), t).settle().await;
        position += 500.0;
        t += 500.0;
    }
    assert_eq!(engine.dispatcher().client().call_count("https://t.example/mid"), 1);

    // the service corrects the duration; the midpoint moves to 26000
    let caught_up =
        engine.apply_document(&accept_unchecked(URL, &unnamed_wire_document(32_000.0)).unwrap());
    assert!(caught_up.is_empty());

    while position <= 28_000.0 {
        engine.tick(&ClockSample::at(position), t).settle().await;
        position += 500.0;
        t += 500.0;
    }

    let client = engine.dispatcher().client();
    assert_eq!(client.call_count("https://t.example/mid"), 1);
    assert_eq!(client.call_count("https://t.example/imp"), 1);

    let snapshot = engine.snapshot();
    let mids: Vec<_> = snapshot
        .items
        .iter()
        .flat_map(|i| i.events.iter())
        .flat_map(|e| e.points.iter())
        .filter(|p| p.kind == EventKind::Midpoint)
        .collect();
    assert_eq!(mids.len(), 1);
    assert_eq!(mids[0].delivery_state, DeliveryState::Done);
    assert_eq!(mids[0].window, Some(TimeRange::new(26_000.0, 26_000.0)));
}
