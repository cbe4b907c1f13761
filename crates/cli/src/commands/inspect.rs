//! `inspect` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{EngineConfig, MetadataSource, ScheduleSnapshot, TimeRange};
use metadata::{accept_unchecked, fetch_for_position, reconcile, HttpMetadataSource};

use crate::cli::InspectArgs;
use crate::error::CliError;

/// What one fetch produced
#[derive(Debug, Serialize)]
struct InspectReport {
    /// URL of the accepted document (anchored if the fallback was used)
    url: String,
    valid_window: TimeRange,
    schedule: ScheduleSnapshot,
}

/// Execute the `inspect` command
pub async fn run_inspect(args: &InspectArgs) -> Result<()> {
    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }
    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let url = beacon_engine::resolve_metadata_url(&config.session)
        .map_err(|e| CliError::config_validation(e.to_string()))?;

    let source =
        HttpMetadataSource::new(Duration::from_millis(config.session.request_timeout_ms))
            .context("Failed to build metadata client")?;

    info!(url = %url, position = ?args.position, "Fetching metadata");
    let report = inspect(&source, &url, args.position, &config.engine).await?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize schedule")?;
        println!("{json}");
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn inspect<S: MetadataSource>(
    source: &S,
    url: &str,
    position: Option<f64>,
    engine: &EngineConfig,
) -> Result<InspectReport> {
    let accepted = match position {
        Some(position) => fetch_for_position(source, url, position, engine.early_fetch_ms).await,
        None => match source.fetch(url).await {
            Ok(doc) => accept_unchecked(url, &doc),
            Err(e) => Err(e),
        },
    }
    .with_context(|| format!("No usable metadata document at {url}"))?;

    let now = position.unwrap_or(accepted.valid_window.start);
    let schedule = reconcile(Vec::new(), &accepted.items, now, engine.retention_ms);

    Ok(InspectReport {
        url: accepted.url,
        valid_window: accepted.valid_window,
        schedule: ScheduleSnapshot::capture(&schedule),
    })
}

fn print_report(report: &InspectReport) {
    println!("\n=== Metadata ===\n");
    println!("URL: {}", report.url);
    println!(
        "Valid: {:.0} .. {:.0} ({:.1}s)",
        report.valid_window.start,
        report.valid_window.end,
        report.valid_window.duration() / 1_000.0
    );

    if report.schedule.items.is_empty() {
        println!("\nNo ad breaks scheduled");
    }
    for item in &report.schedule.items {
        println!("\nBreak {} {}", item.id, fmt_window(item.window));
        for event in &item.events {
            println!("  Ad {} {}", event.id, fmt_window(event.window));
            for point in &event.points {
                println!(
                    "    - {:<15} {} ({} urls)",
                    point.kind.as_str(),
                    fmt_window(point.window),
                    point.callback_urls.len()
                );
            }
        }
    }
    println!();
}

fn fmt_window(window: Option<TimeRange>) -> String {
    match window {
        Some(w) => format!("[{:.0} .. {:.0}]", w.start, w.end),
        None => "[no window]".to_string(),
    }
}
