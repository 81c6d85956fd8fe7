//! AEOLUS-OS - Offshore Wind Turbine Prognostics & Maintenance Intelligence
//!
//! Batch prognostics pipeline: anomaly-intensity stream in, health index,
//! RUL forecast, and prioritized maintenance schedule out.
//!
//! # Usage
//!
//! ```bash
//! # Full pipeline over an anomaly stream
//! aeolus-os run --anomalies data/processed/anomaly_with_root_cause.csv
//!
//! # Individual stages (each consumes the previous stage's artifact)
//! aeolus-os health --anomalies data/processed/anomaly_with_root_cause.csv
//! aeolus-os rul
//! aeolus-os schedule --anomalies data/processed/anomaly_with_root_cause.csv
//!
//! # Re-run automatically whenever the anomaly stream refreshes
//! aeolus-os watch --anomalies data/processed/anomaly_with_root_cause.csv
//! ```
//!
//! # Environment Variables
//!
//! - `AEOLUS_CONFIG`: Path to a turbine_config.toml (default: ./turbine_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use aeolus_os::config::PrognosticsConfig;
use aeolus_os::pipeline::PrognosticsPipeline;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "aeolus-os")]
#[command(about = "AEOLUS-OS Offshore Wind Turbine Prognostics")]
#[command(version)]
struct CliArgs {
    /// Path to the anomaly stream CSV from the detection + root-cause layer
    #[arg(
        long,
        global = true,
        value_name = "CSV",
        default_value = "data/processed/anomaly_with_root_cause.csv"
    )]
    anomalies: String,

    /// Directory for the published artifacts (health, RUL, schedule)
    #[arg(long, global = true, value_name = "DIR", default_value = "data/processed")]
    out_dir: String,

    /// Path to a turbine config TOML (overrides the default search order)
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<String>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run all three stages and publish every artifact
    Run {
        /// Print the run summary as JSON on stdout (for scripting)
        #[arg(long)]
        json: bool,
    },
    /// Stage 1 only: anomaly stream -> health index artifact
    Health,
    /// Stage 2 only: health artifact -> RUL artifact
    Rul,
    /// Stage 3 only: RUL artifact + anomaly stream -> maintenance schedule
    Schedule,
    /// Run the full pipeline whenever the anomaly stream changes (Ctrl-C to stop)
    Watch,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    // Load turbine configuration
    let config = match &args.config {
        Some(path) => PrognosticsConfig::load_from_file(std::path::Path::new(path))
            .with_context(|| format!("failed to load config from {path}"))?,
        None => PrognosticsConfig::load(),
    };
    info!(
        asset = %config.turbine.asset_id,
        site = %config.turbine.site,
        "AEOLUS-OS prognostics starting"
    );

    let pipeline = PrognosticsPipeline::new(config, &args.anomalies, &args.out_dir);

    match args.command {
        SubCommand::Run { json } => {
            let summary = pipeline.run().context("pipeline run failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            info!(%summary, "run complete");
        }
        SubCommand::Health => {
            let samples = pipeline
                .run_health_stage()
                .context("health stage failed")?;
            info!(samples, "health stage complete");
        }
        SubCommand::Rul => {
            let samples = pipeline.run_rul_stage().context("RUL stage failed")?;
            info!(samples, "RUL stage complete");
        }
        SubCommand::Schedule => {
            let records = pipeline
                .run_schedule_stage()
                .context("schedule stage failed")?;
            info!(records, "maintenance schedule complete");
        }
        SubCommand::Watch => {
            // Run once up front so artifacts exist even if the stream never changes
            if let Err(e) = pipeline.run() {
                tracing::error!(error = %e, "initial run failed — watching for a fresh stream");
            }
            pipeline.watch().await;
        }
    }

    Ok(())
}
