//! Turbine Degradation Simulation
//!
//! Generates a synthetic anomaly-intensity stream for exercising AEOLUS-OS
//! without a live detection layer. Simulates a full degradation arc:
//! - Healthy baseline (stable low reconstruction error)
//! - Incipient fault (slow drift, occasional labeled anomalies)
//! - Progressive degradation (accelerating drift, frequent faults)
//!
//! # Usage
//! ```bash
//! ./simulate --samples 2000 --seed 42 --output data/processed/anomaly_with_root_cause.csv
//! aeolus-os run --anomalies data/processed/anomaly_with_root_cause.csv
//! ```

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::fmt::Write as _;
use std::path::PathBuf;

// ============================================================================
// Signal Constants
// ============================================================================

/// Healthy-baseline reconstruction error level
const BASE_INTENSITY: f64 = 0.10;
/// Gaussian noise std around the baseline
const BASE_NOISE_STD: f64 = 0.015;
/// Peak drift added by the end of the progressive-degradation phase
const PEAK_DRIFT: f64 = 3.0;

/// Subsystems a degrading drivetrain fault gets attributed to, with rough
/// attribution odds (gearbox-dominant, occasional electrical misattribution)
const FAULT_LABELS: [(&str, f64); 4] = [
    ("GEARBOX", 0.6),
    ("GENERATOR", 0.2),
    ("SHAFT", 0.1),
    ("POWER_ELECTRONICS", 0.1),
];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simulate")]
#[command(about = "Synthetic turbine degradation stream for AEOLUS-OS testing")]
#[command(version)]
struct Args {
    /// Number of samples to generate
    #[arg(short = 'n', long, default_value = "2000")]
    samples: usize,

    /// Minutes between samples
    #[arg(long, default_value = "60")]
    interval_mins: u32,

    /// Random seed for reproducibility (omit for a random stream)
    #[arg(long)]
    seed: Option<u64>,

    /// First sample timestamp (RFC 3339); defaults to now minus the stream span
    #[arg(long)]
    start: Option<String>,

    /// Output CSV path ("-" for stdout)
    #[arg(short, long, default_value = "data/processed/anomaly_with_root_cause.csv")]
    output: String,

    /// Scenario: "degradation" (full arc) or "healthy" (baseline only)
    #[arg(long, default_value = "degradation")]
    scenario: String,
}

// ============================================================================
// Degradation Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Stable operation (0-50% of the stream)
    HealthyBaseline,
    /// Drift begins, sparse labeled faults (50-75%)
    IncipientFault,
    /// Accelerating drift, frequent labeled faults (75-100%)
    ProgressiveDegradation,
}

impl Phase {
    fn at(progress: f64) -> Self {
        if progress < 0.5 {
            Phase::HealthyBaseline
        } else if progress < 0.75 {
            Phase::IncipientFault
        } else {
            Phase::ProgressiveDegradation
        }
    }

    /// Drift above baseline at this point of the arc.
    fn drift(self, progress: f64) -> f64 {
        match self {
            Phase::HealthyBaseline => 0.0,
            // Linear ramp to 20% of peak across the incipient window
            Phase::IncipientFault => (progress - 0.5) / 0.25 * 0.2 * PEAK_DRIFT,
            // Quadratic ramp from 20% to 100% of peak
            Phase::ProgressiveDegradation => {
                let t = (progress - 0.75) / 0.25;
                (0.2 + 0.8 * t * t) * PEAK_DRIFT
            }
        }
    }

    /// Probability that a sample carries a root-cause label.
    fn fault_probability(self) -> f64 {
        match self {
            Phase::HealthyBaseline => 0.0,
            Phase::IncipientFault => 0.03,
            Phase::ProgressiveDegradation => 0.15,
        }
    }
}

fn pick_label(rng: &mut StdRng) -> &'static str {
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (label, odds) in FAULT_LABELS {
        cumulative += odds;
        if roll < cumulative {
            return label;
        }
    }
    FAULT_LABELS[0].0
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let noise = Normal::new(0.0, BASE_NOISE_STD)?;

    let interval = Duration::minutes(i64::from(args.interval_mins));
    let start: DateTime<Utc> = match &args.start {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map_err(|e| anyhow::anyhow!("invalid --start timestamp: {e}"))?
            .with_timezone(&Utc),
        None => Utc::now() - interval * args.samples as i32,
    };
    let healthy_only = args.scenario == "healthy";

    let mut contents = String::from("time_stamp,reconstruction_error,root_cause\n");
    for i in 0..args.samples {
        let progress = i as f64 / args.samples.max(1) as f64;
        let phase = if healthy_only {
            Phase::HealthyBaseline
        } else {
            Phase::at(progress)
        };

        let intensity =
            (BASE_INTENSITY + phase.drift(progress) + noise.sample(&mut rng)).max(0.0);
        let label = if rng.gen::<f64>() < phase.fault_probability() {
            pick_label(&mut rng)
        } else {
            ""
        };

        let ts = start + interval * i as i32;
        let _ = writeln!(
            contents,
            "{},{:.6},{}",
            ts.format("%Y-%m-%d %H:%M:%S"),
            intensity,
            label
        );
    }

    if args.output == "-" {
        print!("{contents}");
    } else {
        let path = PathBuf::from(&args.output);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, contents)?;
        eprintln!(
            "wrote {} samples ({} scenario) to {}",
            args.samples, args.scenario, args.output
        );
    }

    Ok(())
}
