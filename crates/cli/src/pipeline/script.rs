//! Sample script - JSON lines replayed into a session.
//!
//! Each non-empty line is either a clock sample or a player action:
//!
//! ```text
//! {"position": 1700000000000, "rate": 1.0}
//! {"at_ms": 2500, "position": 1700000002500}
//! {"action": "pause"}
//! ```
//!
//! `at_ms` is the offset from the start of the replay. Lines without it follow
//! the previous line after the configured sample interval. Lines starting with
//! `#` are comments.

use std::path::Path;
use std::time::Duration;

use contracts::{ClockSample, EventKind};
use serde::Deserialize;

use crate::error::CliError;

/// Payload of one script line
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEntry {
    Sample(ClockSample),
    Action(EventKind),
}

/// One timed script line
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    /// Offset from the start of the replay
    pub at: Duration,
    pub entry: ScriptEntry,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Action {
        action: EventKind,
        #[serde(default)]
        at_ms: Option<u64>,
    },
    Sample {
        #[serde(default)]
        at_ms: Option<u64>,
        #[serde(flatten)]
        sample: ClockSample,
    },
}

/// Parse a script; `interval_ms` spaces lines without `at_ms`
pub fn parse_script(
    content: &str,
    path: &Path,
    interval_ms: u64,
) -> Result<Vec<ScriptStep>, CliError> {
    let mut steps = Vec::new();
    let mut last: Option<u64> = None;

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed: Line = serde_json::from_str(line)
            .map_err(|e| CliError::script(path, line_no, e.to_string()))?;
        let (at_ms, entry) = match parsed {
            Line::Action { action, at_ms } => (at_ms, ScriptEntry::Action(action)),
            Line::Sample { at_ms, sample } => (at_ms, ScriptEntry::Sample(sample)),
        };

        if let ScriptEntry::Action(kind) = entry {
            if !kind.is_action_driven() {
                return Err(CliError::script(
                    path,
                    line_no,
                    format!("'{kind}' is not a player action"),
                ));
            }
        }

        let at = match (at_ms, last) {
            (Some(at), Some(prev)) if at < prev => {
                return Err(CliError::script(
                    path,
                    line_no,
                    format!("at_ms {at} is before the previous line ({prev})"),
                ));
            }
            (Some(at), _) => at,
            (None, Some(prev)) => prev + interval_ms,
            (None, None) => 0,
        };
        last = Some(at);

        steps.push(ScriptStep {
            at: Duration::from_millis(at),
            entry,
        });
    }

    Ok(steps)
}

/// Read and parse a script file
pub fn load_script(path: &Path, interval_ms: u64) -> Result<Vec<ScriptStep>, CliError> {
    let content = std::fs::read_to_string(path)?;
    parse_script(&content, path, interval_ms)
}
