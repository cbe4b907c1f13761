//! Session pipeline: script replay and run statistics.

mod orchestrator;
mod script;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use script::load_script;
pub use stats::SessionStats;
