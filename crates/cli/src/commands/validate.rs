//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::TrackerConfig;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    metadata_url: Option<String>,
    refresh_interval_ms: u64,
    tick_interval_ms: u64,
    max_speed: f64,
    end_tolerance_ms: f64,
    retention_ms: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    metadata_url: beacon_engine::resolve_metadata_url(&config.session).ok(),
                    refresh_interval_ms: config.session.refresh_interval_ms,
                    tick_interval_ms: config.session.tick_interval_ms,
                    max_speed: config.engine.max_speed,
                    end_tolerance_ms: config.engine.end_tolerance_ms,
                    retention_ms: config.engine.retention_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &TrackerConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let session = &config.session;
    let engine = &config.engine;

    if let Err(e) = config_loader::validate_runnable(config) {
        warnings.push(format!("Not runnable as is: {e}"));
    } else if let Err(e) = beacon_engine::resolve_metadata_url(session) {
        warnings.push(format!("Metadata URL cannot be derived: {e}"));
    }

    if session.tick_interval_ms as f64 > engine.min_dispatch_window_ms {
        warnings.push(format!(
            "session.tick_interval_ms ({}) exceeds engine.min_dispatch_window_ms ({}) - \
             zero-length points rely on catch-up",
            session.tick_interval_ms, engine.min_dispatch_window_ms
        ));
    }

    if engine.retention_ms < session.refresh_interval_ms as f64 {
        warnings.push(format!(
            "engine.retention_ms ({}) is shorter than session.refresh_interval_ms ({})",
            engine.retention_ms, session.refresh_interval_ms
        ));
    }

    if session.sample_interval_ms as f64 > engine.sampling_period_ms {
        warnings.push(format!(
            "session.sample_interval_ms ({}) exceeds engine.sampling_period_ms ({}) - \
             played coverage may fragment",
            session.sample_interval_ms, engine.sampling_period_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!(
                "\n  Metadata URL: {}",
                summary.metadata_url.as_deref().unwrap_or("<unset>")
            );
            println!("  Refresh interval: {} ms", summary.refresh_interval_ms);
            println!("  Tick interval: {} ms", summary.tick_interval_ms);
            println!("  Max speed: {}", summary.max_speed);
            println!("  End tolerance: {} ms", summary.end_tolerance_ms);
            println!("  Retention: {} ms", summary.retention_ms);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
