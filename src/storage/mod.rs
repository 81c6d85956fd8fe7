//! CSV Artifact Store
//!
//! Each pipeline stage consumes the previous stage's persisted artifact and
//! publishes its own. Artifacts are plain CSV so the dashboard/API layer and
//! downstream alerting can consume them without linking this crate.
//!
//! ## Schema flexibility
//!
//! The anomaly stream arrives from an upstream detection + root-cause layer
//! whose column names vary by model generation. The reader auto-detects:
//! - timestamp column: `time_stamp` or `timestamp`
//! - intensity column: first of `anomaly_score`, `reconstruction_error`,
//!   `is_anomaly`
//! - subsystem column: first match from the root-cause candidate list
//!
//! A missing timestamp or intensity column is a fatal schema error; rows that
//! fail to parse are dropped and counted, never fatal.
//!
//! Writes are atomic (temp file + rename): a failed run never truncates the
//! previous artifact, so a re-run either fully succeeds or leaves the prior
//! output in place.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::types::{AnomalySample, HealthSample, MaintenanceRecord, RulSample, Subsystem};

// ============================================================================
// Artifact names (matching the published pipeline contract)
// ============================================================================

/// Stage 1 output artifact.
pub const HEALTH_ARTIFACT: &str = "health_index.csv";
/// Stage 2 output artifact.
pub const RUL_ARTIFACT: &str = "realtime_rul.csv";
/// Stage 3 output artifact.
pub const SCHEDULE_ARTIFACT: &str = "maintenance_schedule.csv";

/// Candidate column names for the root-cause subsystem label, in priority
/// order. Different upstream model generations used different names.
const SUBSYSTEM_COLUMN_CANDIDATES: [&str; 7] = [
    "root_cause",
    "RCA",
    "root_cause_combined",
    "subsystem",
    "physical_subsystem",
    "pred_subsystem",
    "fault_subsystem",
];

/// Candidate intensity columns, in priority order.
const INTENSITY_COLUMN_CANDIDATES: [&str; 3] =
    ["anomaly_score", "reconstruction_error", "is_anomaly"];

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("artifact I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("{path}: no timestamp column found (expected `time_stamp` or `timestamp`)")]
    MissingTimestamp { path: PathBuf },

    #[error(
        "{path}: no anomaly intensity column found \
         (expected one of `anomaly_score`, `reconstruction_error`, `is_anomaly`)"
    )]
    MissingIntensity { path: PathBuf },

    #[error("{path}: required column `{column}` not found")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{0}: file contains a header but no parseable data rows")]
    NoValidRows(PathBuf),

    #[error("{0}: file is empty")]
    EmptyFile(PathBuf),
}

// ============================================================================
// Anomaly stream ingest
// ============================================================================

/// Result of reading the anomaly stream, with ingest metadata for the run
/// summary.
#[derive(Debug, Clone)]
pub struct AnomalyIngest {
    /// Samples sorted ascending by timestamp.
    pub samples: Vec<AnomalySample>,
    /// Which intensity column was selected.
    pub intensity_column: String,
    /// Which subsystem column was detected, if any.
    pub subsystem_column: Option<String>,
    /// Rows dropped for unparseable timestamps or values.
    pub dropped_rows: usize,
}

// ============================================================================
// Artifact Store
// ============================================================================

/// Reads the anomaly stream and owns the three published artifacts inside
/// one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    out_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn health_path(&self) -> PathBuf {
        self.out_dir.join(HEALTH_ARTIFACT)
    }

    pub fn rul_path(&self) -> PathBuf {
        self.out_dir.join(RUL_ARTIFACT)
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.out_dir.join(SCHEDULE_ARTIFACT)
    }

    // ------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------

    /// Read the anomaly-intensity stream with schema auto-detection.
    ///
    /// Rows with unparseable timestamps or intensity values are dropped and
    /// counted. The returned samples are sorted ascending by timestamp.
    pub fn read_anomaly_stream(path: &Path) -> Result<AnomalyIngest, StorageError> {
        let (header, lines) = read_csv_lines(path)?;

        let ts_col = find_column(&header, &["time_stamp", "timestamp"])
            .ok_or_else(|| StorageError::MissingTimestamp {
                path: path.to_path_buf(),
            })?;
        let intensity_col = find_column(&header, &INTENSITY_COLUMN_CANDIDATES)
            .ok_or_else(|| StorageError::MissingIntensity {
                path: path.to_path_buf(),
            })?;
        let subsystem_col = find_column(&header, &SUBSYSTEM_COLUMN_CANDIDATES);

        let mut samples = Vec::with_capacity(lines.len());
        let mut dropped = 0usize;
        for line in &lines {
            let fields = csv_split(line);
            let parsed = fields.get(ts_col.0).and_then(|f| parse_timestamp(f)).zip(
                fields
                    .get(intensity_col.0)
                    .and_then(|f| parse_intensity(f)),
            );
            let Some((timestamp, intensity)) = parsed else {
                dropped += 1;
                continue;
            };
            let subsystem = subsystem_col.as_ref().and_then(|(idx, _)| {
                fields
                    .get(*idx)
                    .filter(|f| !f.trim().is_empty())
                    .map(|f| Subsystem::from_label(f))
            });
            samples.push(AnomalySample {
                timestamp,
                intensity,
                subsystem,
            });
        }

        if samples.is_empty() {
            return Err(StorageError::NoValidRows(path.to_path_buf()));
        }
        samples.sort_by_key(|s| s.timestamp);

        if dropped > 0 {
            warn!(path = %path.display(), dropped, "dropped unparseable anomaly rows");
        }
        info!(
            path = %path.display(),
            samples = samples.len(),
            intensity_column = %intensity_col.1,
            subsystem_column = subsystem_col.as_ref().map(|(_, name)| name.as_str()),
            "anomaly stream loaded"
        );

        Ok(AnomalyIngest {
            samples,
            intensity_column: intensity_col.1,
            subsystem_column: subsystem_col.map(|(_, name)| name),
            dropped_rows: dropped,
        })
    }

    /// Read a previously published health artifact.
    pub fn read_health_series(path: &Path) -> Result<Vec<HealthSample>, StorageError> {
        let (header, lines) = read_csv_lines(path)?;

        let ts_col = find_column(&header, &["time_stamp", "timestamp"])
            .ok_or_else(|| StorageError::MissingTimestamp {
                path: path.to_path_buf(),
            })?;
        let health_col = find_column(&header, &["health_index"]).ok_or_else(|| {
            StorageError::MissingColumn {
                path: path.to_path_buf(),
                column: "health_index".to_string(),
            }
        })?;

        let mut samples = Vec::with_capacity(lines.len());
        let mut dropped = 0usize;
        for line in &lines {
            let fields = csv_split(line);
            let parsed = fields
                .get(ts_col.0)
                .and_then(|f| parse_timestamp(f))
                .zip(fields.get(health_col.0).and_then(|f| f.trim().parse::<f64>().ok()));
            match parsed {
                Some((timestamp, health_index)) => samples.push(HealthSample {
                    timestamp,
                    health_index,
                }),
                None => dropped += 1,
            }
        }

        if samples.is_empty() {
            return Err(StorageError::NoValidRows(path.to_path_buf()));
        }
        samples.sort_by_key(|s| s.timestamp);
        if dropped > 0 {
            warn!(path = %path.display(), dropped, "dropped unparseable health rows");
        }
        Ok(samples)
    }

    /// Read a previously published RUL artifact.
    ///
    /// The RUL column is matched by exact name first, then by any column
    /// whose name contains "rul" (case-insensitive) — older artifact
    /// generations used different capitalizations.
    pub fn read_rul_series(path: &Path) -> Result<Vec<RulSample>, StorageError> {
        let (header, lines) = read_csv_lines(path)?;

        let ts_col = find_column(&header, &["time_stamp", "timestamp"])
            .ok_or_else(|| StorageError::MissingTimestamp {
                path: path.to_path_buf(),
            })?;
        let rul_col = find_column(&header, &["RealTime_RUL_hours"])
            .or_else(|| {
                header
                    .iter()
                    .enumerate()
                    .find(|(_, name)| name.to_lowercase().contains("rul"))
                    .map(|(idx, name)| (idx, name.clone()))
            })
            .ok_or_else(|| StorageError::MissingColumn {
                path: path.to_path_buf(),
                column: "RealTime_RUL_hours".to_string(),
            })?;
        let health_col = find_column(&header, &["health_index"]);
        let slope_col = find_column(&header, &["health_slope_per_hour"]);

        let mut samples = Vec::with_capacity(lines.len());
        let mut dropped = 0usize;
        for line in &lines {
            let fields = csv_split(line);
            let float_at = |col: &Option<(usize, String)>| {
                col.as_ref()
                    .and_then(|(idx, _)| fields.get(*idx))
                    .and_then(|f| f.trim().parse::<f64>().ok())
            };
            let parsed = fields
                .get(ts_col.0)
                .and_then(|f| parse_timestamp(f))
                .zip(fields.get(rul_col.0).and_then(|f| f.trim().parse::<f64>().ok()));
            match parsed {
                Some((timestamp, rul_hours)) => samples.push(RulSample {
                    timestamp,
                    health_index: float_at(&health_col).unwrap_or(f64::NAN),
                    slope_per_hour: float_at(&slope_col).unwrap_or(0.0),
                    rul_hours,
                }),
                None => dropped += 1,
            }
        }

        if samples.is_empty() {
            return Err(StorageError::NoValidRows(path.to_path_buf()));
        }
        samples.sort_by_key(|s| s.timestamp);
        if dropped > 0 {
            warn!(path = %path.display(), dropped, "dropped unparseable RUL rows");
        }
        Ok(samples)
    }

    // ------------------------------------------------------------------
    // Writers
    // ------------------------------------------------------------------

    /// Publish the health artifact, replacing any previous version.
    pub fn write_health_series(&self, samples: &[HealthSample]) -> Result<PathBuf, StorageError> {
        let mut contents = String::from("time_stamp,health_index\n");
        for s in samples {
            let _ = writeln!(
                contents,
                "{},{}",
                format_timestamp(s.timestamp),
                s.health_index
            );
        }
        let path = self.health_path();
        atomic_write(&path, &contents)?;
        info!(path = %path.display(), samples = samples.len(), "health artifact published");
        Ok(path)
    }

    /// Publish the RUL artifact, replacing any previous version.
    pub fn write_rul_series(&self, samples: &[RulSample]) -> Result<PathBuf, StorageError> {
        let mut contents =
            String::from("timestamp,health_index,health_slope_per_hour,RealTime_RUL_hours\n");
        for s in samples {
            let _ = writeln!(
                contents,
                "{},{},{},{}",
                format_timestamp(s.timestamp),
                s.health_index,
                s.slope_per_hour,
                s.rul_hours
            );
        }
        let path = self.rul_path();
        atomic_write(&path, &contents)?;
        info!(path = %path.display(), samples = samples.len(), "RUL artifact published");
        Ok(path)
    }

    /// Publish the maintenance schedule, replacing any previous version.
    ///
    /// Numeric columns are rounded for operator display (the schedule is a
    /// report, not an input to further computation).
    pub fn write_schedule(&self, records: &[MaintenanceRecord]) -> Result<PathBuf, StorageError> {
        let mut contents = String::from(
            "Subsystem,Base RUL (hrs),Effective RUL (hrs),Recent Anomalies,Criticality,\
             Recency Factor,Priority Score,Predicted Maintenance Due,Recommended Action\n",
        );
        for r in records {
            let _ = writeln!(
                contents,
                "{},{:.2},{:.2},{},{:.2},{:.3},{:.4},{},{}",
                r.subsystem,
                r.base_rul_hours,
                r.effective_rul_hours,
                r.recent_anomaly_count,
                r.criticality,
                r.recency_factor,
                r.priority_score,
                format_timestamp(r.predicted_due),
                csv_field(r.recommended_action.display_name()),
            );
        }
        let path = self.schedule_path();
        atomic_write(&path, &contents)?;
        info!(path = %path.display(), records = records.len(), "maintenance schedule published");
        Ok(path)
    }
}

// ============================================================================
// CSV primitives
// ============================================================================

/// Read a CSV file into (header fields, data lines). Blank lines are skipped.
fn read_csv_lines(path: &Path) -> Result<(Vec<String>, Vec<String>), StorageError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| StorageError::Io(path.to_path_buf(), e))?;

    let mut lines = contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string);
    let header_line = lines
        .next()
        .ok_or_else(|| StorageError::EmptyFile(path.to_path_buf()))?;
    let header = csv_split(&header_line)
        .into_iter()
        .map(|f| f.trim().to_string())
        .collect();
    Ok((header, lines.collect()))
}

/// Find the first matching column from a candidate list.
/// Returns (index, actual header name).
fn find_column(header: &[String], candidates: &[&str]) -> Option<(usize, String)> {
    for candidate in candidates {
        if let Some(idx) = header.iter().position(|h| h == candidate) {
            return Some((idx, header[idx].clone()));
        }
    }
    None
}

/// Split a CSV line respecting quoted fields (commas inside quotes stay put,
/// doubled quotes unescape).
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Quote a field only when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Parse a timestamp in RFC 3339 or naive `YYYY-MM-DD HH:MM:SS[.f]` form
/// (naive values are taken as UTC).
fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(field) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(field, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Parse an intensity value: a float, or a boolean flag column
/// (`True`/`False`) mapped to 1.0/0.0.
fn parse_intensity(field: &str) -> Option<f64> {
    let field = field.trim();
    match field.to_lowercase().as_str() {
        "true" => return Some(1.0),
        "false" => return Some(0.0),
        _ => {}
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Artifact timestamps are published in naive UTC form, which both this
/// store and common dataframe tooling parse back without a timezone step.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Write contents to a temp file beside the target, then rename over it.
fn atomic_write(path: &Path, contents: &str) -> Result<(), StorageError> {
    let io_err = |e: std::io::Error| StorageError::Io(path.to_path_buf(), e);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let tmp = path.with_extension("csv.tmp");
    std::fs::write(&tmp, contents).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
