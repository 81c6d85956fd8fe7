//! Pipeline Coordinator
//!
//! Runs the three estimator stages in dependency order, persisting each
//! stage's artifact before the next stage starts:
//!
//! anomaly stream -> health index -> real-time RUL -> maintenance schedule
//!
//! Each stage is a pure batch transform over the full upstream series; a
//! re-run recomputes everything from scratch and overwrites the previous
//! artifacts wholesale. There is no streaming or incremental update — the
//! anomaly stream refreshes on the order of minutes while a full recompute
//! takes milliseconds, so incremental bookkeeping would buy nothing.
//!
//! `watch()` re-runs the pipeline whenever the anomaly artifact's mtime
//! changes, with a debounce to ride out partial writes from the upstream
//! exporter.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::PrognosticsConfig;
use crate::health::{HealthIndexError, HealthIndexEstimator};
use crate::maintenance::MaintenanceScheduler;
use crate::rul::{RulError, RulEstimator};
use crate::storage::{ArtifactStore, StorageError};
use crate::types::{RecommendedAction, Subsystem};

/// Interval between anomaly-artifact mtime checks in watch mode.
const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Debounce delay after detecting a change (exporters often write in stages).
const WATCH_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    HealthIndex(#[from] HealthIndexError),

    #[error(transparent)]
    Rul(#[from] RulError),
}

// ============================================================================
// Run Summary
// ============================================================================

/// Compact result of one full pipeline run, for logs and operator reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub samples: usize,
    pub dropped_rows: usize,
    pub final_health: f64,
    pub final_rul_hours: f64,
    pub top_subsystem: Subsystem,
    pub top_priority: f64,
    pub top_action: RecommendedAction,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} samples ({} dropped) | health {:.3} | RUL {:.1} h | top: {} ({:.4}) -> {}",
            self.samples,
            self.dropped_rows,
            self.final_health,
            self.final_rul_hours,
            self.top_subsystem,
            self.top_priority,
            self.top_action
        )
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owns one asset's pipeline: the anomaly stream location, the artifact
/// store, and the tuning config passed into each stage.
pub struct PrognosticsPipeline {
    config: PrognosticsConfig,
    anomaly_path: PathBuf,
    store: ArtifactStore,
}

impl PrognosticsPipeline {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(
        config: PrognosticsConfig,
        anomaly_path: P,
        out_dir: Q,
    ) -> Self {
        Self {
            config,
            anomaly_path: anomaly_path.into(),
            store: ArtifactStore::new(out_dir),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run all three stages over the current anomaly stream.
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let started = std::time::Instant::now();
        let ingest = ArtifactStore::read_anomaly_stream(&self.anomaly_path)?;

        let health = HealthIndexEstimator::new(&self.config.health).estimate(&ingest.samples)?;
        self.store.write_health_series(&health)?;

        let rul = RulEstimator::new(&self.config.rul).estimate(&health)?;
        self.store.write_rul_series(&rul)?;

        // estimate() guarantees equal-length, non-empty output
        let Some(latest) = rul.last() else {
            return Err(RulError::EmptyInput.into());
        };
        let schedule =
            MaintenanceScheduler::new(&self.config.scheduler).schedule(latest, &ingest.samples);
        self.store.write_schedule(&schedule)?;

        let Some(top) = schedule.first() else {
            // validate() rejects an empty criticality table before we get here
            return Err(RulError::EmptyInput.into());
        };
        let summary = RunSummary {
            samples: ingest.samples.len(),
            dropped_rows: ingest.dropped_rows,
            final_health: latest.health_index,
            final_rul_hours: latest.rul_hours,
            top_subsystem: top.subsystem,
            top_priority: top.priority_score,
            top_action: top.recommended_action,
        };

        info!(
            asset = %self.config.turbine.asset_id,
            samples = summary.samples,
            dropped_rows = summary.dropped_rows,
            final_health = summary.final_health,
            final_rul_hours = summary.final_rul_hours,
            top_subsystem = %summary.top_subsystem,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline run complete"
        );
        Ok(summary)
    }

    /// Run only stage 1, publishing the health artifact.
    pub fn run_health_stage(&self) -> Result<usize, PipelineError> {
        let ingest = ArtifactStore::read_anomaly_stream(&self.anomaly_path)?;
        let health = HealthIndexEstimator::new(&self.config.health).estimate(&ingest.samples)?;
        self.store.write_health_series(&health)?;
        Ok(health.len())
    }

    /// Run only stage 2, consuming the persisted health artifact.
    pub fn run_rul_stage(&self) -> Result<usize, PipelineError> {
        let health = ArtifactStore::read_health_series(&self.store.health_path())?;
        let rul = RulEstimator::new(&self.config.rul).estimate(&health)?;
        self.store.write_rul_series(&rul)?;
        Ok(rul.len())
    }

    /// Run only stage 3, consuming the persisted RUL artifact and the
    /// labeled anomaly stream.
    pub fn run_schedule_stage(&self) -> Result<usize, PipelineError> {
        let rul = ArtifactStore::read_rul_series(&self.store.rul_path())?;
        let Some(latest) = rul.last() else {
            return Err(RulError::EmptyInput.into());
        };
        let ingest = ArtifactStore::read_anomaly_stream(&self.anomaly_path)?;
        let schedule =
            MaintenanceScheduler::new(&self.config.scheduler).schedule(latest, &ingest.samples);
        self.store.write_schedule(&schedule)?;
        Ok(schedule.len())
    }

    /// Re-run the full pipeline whenever the anomaly artifact changes.
    ///
    /// Polls the file's mtime, debounces, then recomputes. A failing run
    /// logs the error and keeps watching — the previous artifacts stay in
    /// place untouched. Returns when Ctrl-C is received.
    pub async fn watch(&self) {
        info!(
            path = %self.anomaly_path.display(),
            poll_secs = WATCH_POLL_INTERVAL.as_secs(),
            "watching anomaly stream for changes"
        );

        let mut last_mtime = mtime(&self.anomaly_path);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("watch stopped");
                    return;
                }
                () = tokio::time::sleep(WATCH_POLL_INTERVAL) => {}
            }

            let current = match mtime(&self.anomaly_path) {
                Some(t) => t,
                None => {
                    if last_mtime.is_some() {
                        warn!(
                            path = %self.anomaly_path.display(),
                            "anomaly stream not accessible — keeping last artifacts, will retry"
                        );
                        last_mtime = None;
                    }
                    continue;
                }
            };

            let changed = last_mtime.map_or(true, |prev| current != prev);
            if !changed {
                continue;
            }

            // Debounce: re-check mtime to make sure the write finished
            tokio::time::sleep(WATCH_DEBOUNCE_DELAY).await;
            if mtime(&self.anomaly_path) != Some(current) {
                continue;
            }
            last_mtime = Some(current);

            match self.run() {
                Ok(summary) => info!(%summary, "watch refresh complete"),
                Err(e) => error!(error = %e, "watch refresh failed — previous artifacts kept"),
            }
        }
    }
}

/// Modification time of a file, or None on any error.
fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
