//! Session run statistics.

use std::time::Duration;

use beacon_engine::SessionSummary;
use contracts::{DeliveryState, ScheduleSnapshot};
use observability::{DeliveryAggregator, DeliverySummary};

/// Statistics from a replayed session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Wall time of the replay
    pub duration: Duration,

    /// Samples pushed into the session
    pub samples_replayed: u64,

    /// Actions reported to the session
    pub actions_reported: u64,

    /// Actions that matched a tracking point
    pub actions_dispatched: u64,

    /// Whether the replay stopped early (timeout or signal)
    pub interrupted: bool,

    /// What the session itself counted
    pub session: SessionSummary,

    /// Per-request delivery aggregate
    pub delivery: DeliveryAggregator,
}

impl SessionStats {
    /// Fold terminal point states of the final schedule into the aggregate
    pub fn record_points(&mut self, schedule: &ScheduleSnapshot) {
        let points = schedule
            .items
            .iter()
            .flat_map(|item| item.events.iter())
            .flat_map(|event| event.points.iter());
        for point in points {
            match point.delivery_state {
                DeliveryState::Done => self.delivery.record_point(point.kind.as_str(), true),
                DeliveryState::Failed => self.delivery.record_point(point.kind.as_str(), false),
                DeliveryState::Idle | DeliveryState::Connecting => {}
            }
        }
    }

    pub fn delivery_summary(&self) -> DeliverySummary {
        self.delivery.summary()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Tracking Session ===");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Samples replayed: {}", self.samples_replayed);
        println!(
            "Actions: {} reported, {} dispatched",
            self.actions_reported, self.actions_dispatched
        );
        if self.interrupted {
            println!("Replay interrupted before the end of the script");
        }
        println!(
            "Metadata: {} documents accepted, {} failed fetches",
            self.session.documents_accepted, self.session.fetch_failures
        );
        if !self.session.ticks.is_empty() {
            println!("Ticks:");
            for (decision, count) in &self.session.ticks {
                println!("  {decision}: {count}");
            }
        }

        println!();
        print!("{}", self.delivery_summary());
        if self.session.delivery.reports_dropped > 0 {
            println!(
                "Reports dropped (queue full): {}",
                self.session.delivery.reports_dropped
            );
        }
        println!();
    }
}
