//! Mock collaborators and document builders.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use contracts::{
    AdBreakDoc, AdDoc, BeaconClient, ContractError, DataRangeDoc, EventKind, MetadataDocument,
    MetadataSource, TrackingEventDoc,
};

/// Beacon client answering 200 unless told otherwise; records every URL
#[derive(Default)]
pub struct MockBeaconClient {
    statuses: HashMap<String, u16>,
    unreachable: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockBeaconClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.push(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

impl BeaconClient for MockBeaconClient {
    async fn send(&self, url: &str) -> Result<u16, ContractError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.unreachable.iter().any(|u| u == url) {
            return Err(ContractError::beacon_transport(url, "connection refused"));
        }
        Ok(self.statuses.get(url).copied().unwrap_or(200))
    }
}

/// Metadata source answering from a queue, then from a fallback document
#[derive(Default)]
pub struct MockMetadataSource {
    replies: Mutex<VecDeque<Result<MetadataDocument, ContractError>>>,
    fallback: Option<MetadataDocument>,
    requested: Mutex<Vec<String>>,
}

impl MockMetadataSource {
    /// Always answers with `doc`
    pub fn serving(doc: MetadataDocument) -> Self {
        Self {
            fallback: Some(doc),
            ..Self::default()
        }
    }

    pub fn then(self, reply: Result<MetadataDocument, ContractError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl MetadataSource for MockMetadataSource {
    async fn fetch(&self, url: &str) -> Result<MetadataDocument, ContractError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        self.fallback
            .clone()
            .ok_or_else(|| ContractError::metadata_fetch(url, "503 Service Unavailable"))
    }
}

pub fn beacon_url(id: &str) -> String {
    format!("https://beacons.example/{id}")
}

/// Tracking event with an explicit id and one callback URL named after it
pub fn event(id: &str, kind: EventKind, start: f64, duration: f64) -> TrackingEventDoc {
    TrackingEventDoc {
        id: Some(id.to_string()),
        event: kind,
        start_time: Some(start),
        duration: Some(duration),
        signaling_urls: vec![beacon_url(id)],
    }
}

pub fn ad(id: &str, start: f64, duration: f64, events: Vec<TrackingEventDoc>) -> AdDoc {
    AdDoc {
        id: Some(id.to_string()),
        start_time: Some(start),
        duration: Some(duration),
        tracking_events: events,
    }
}

pub fn ad_break(id: &str, start: f64, duration: f64, ads: Vec<AdDoc>) -> AdBreakDoc {
    AdBreakDoc {
        id: Some(id.to_string()),
        start_time: Some(start),
        duration: Some(duration),
        ads,
    }
}

pub fn document(range: (f64, f64), breaks: Vec<AdBreakDoc>) -> MetadataDocument {
    MetadataDocument {
        ad_breaks: breaks,
        data_range: Some(DataRangeDoc {
            start: Some(range.0),
            end: Some(range.1),
        }),
    }
}

/// One 30 s break at 10 s with the usual quartile points and a pause tracker
pub fn standard_break() -> AdBreakDoc {
    ad_break(
        "pod-1",
        10_000.0,
        30_000.0,
        vec![ad(
            "ad-1",
            10_000.0,
            30_000.0,
            vec![
                event("imp", EventKind::Impression, 10_000.0, 0.0),
                event("start", EventKind::Start, 10_000.0, 0.0),
                event("q1", EventKind::FirstQuartile, 17_500.0, 0.0),
                event("mid", EventKind::Midpoint, 25_000.0, 0.0),
                event("q3", EventKind::ThirdQuartile, 32_500.0, 0.0),
                event("complete", EventKind::Complete, 40_000.0, 0.0),
                event("pause", EventKind::Pause, 10_000.0, 30_000.0),
            ],
        )],
    )
}
