//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::TrackerConfig;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{load_script, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut config, args);
    config_loader::validate_runnable(&config)
        .map_err(|e| CliError::config_validation(e.to_string()))?;

    if !(args.speed > 0.0) {
        return Err(CliError::config_validation(format!(
            "--speed must be > 0, got {}",
            args.speed
        ))
        .into());
    }

    let steps = load_script(&args.samples, config.session.sample_interval_ms)
        .with_context(|| format!("Failed to load samples from {}", args.samples.display()))?;

    info!(
        media_url = ?config.session.media_url,
        metadata_url = ?config.session.metadata_url,
        steps = steps.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration and script are valid, exiting");
        print_config_summary(&config, steps.len());
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        config,
        steps,
        speed: args.speed,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting tracking session...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .map_err(|e| CliError::session_execution(format!("{e:#}")))?;

    info!(
        samples = stats.samples_replayed,
        duration_secs = stats.duration.as_secs_f64(),
        "Tracking session completed"
    );
    stats.print_summary();

    Ok(())
}

fn apply_overrides(config: &mut TrackerConfig, args: &RunArgs) {
    if let Some(ref url) = args.media_url {
        info!(media_url = %url, "Overriding media URL from CLI");
        config.session.media_url = Some(url.clone());
    }
    if let Some(ref url) = args.metadata_url {
        info!(metadata_url = %url, "Overriding metadata URL from CLI");
        config.session.metadata_url = Some(url.clone());
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &TrackerConfig, steps: usize) {
    let session = &config.session;
    let engine = &config.engine;

    println!("\n=== Configuration Summary ===\n");
    println!("Session:");
    match beacon_engine::resolve_metadata_url(session) {
        Ok(url) => println!("  Metadata URL: {url}"),
        Err(e) => println!("  Metadata URL: <{e}>"),
    }
    println!(
        "  Refresh every {} ms, tick every {} ms",
        session.refresh_interval_ms, session.tick_interval_ms
    );
    println!("  Script steps: {steps}");

    println!("\nEngine:");
    println!("  Max speed: {}", engine.max_speed);
    println!("  End tolerance: {} ms", engine.end_tolerance_ms);
    println!("  Min dispatch window: {} ms", engine.min_dispatch_window_ms);
    println!("  Retention: {} ms", engine.retention_ms);
    println!();
}
