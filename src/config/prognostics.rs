//! Prognostics Configuration - All estimator tunings as operator-tunable TOML values
//!
//! Each struct implements `Default` with values matching the parameters the
//! system was tuned with, ensuring zero-change behavior when no config file
//! is present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::Subsystem;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one turbine deployment.
///
/// Load with `PrognosticsConfig::load()` which searches:
/// 1. `$AEOLUS_CONFIG` env var
/// 2. `./turbine_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrognosticsConfig {
    /// Asset identification
    #[serde(default)]
    pub turbine: TurbineInfo,

    /// Health Index Estimator tuning
    #[serde(default)]
    pub health: HealthIndexConfig,

    /// Real-Time RUL Estimator tuning
    #[serde(default)]
    pub rul: RulConfig,

    /// Maintenance scheduler tuning + criticality table
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for PrognosticsConfig {
    fn default() -> Self {
        Self {
            turbine: TurbineInfo::default(),
            health: HealthIndexConfig::default(),
            rul: RulConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl PrognosticsConfig {
    /// Load configuration using the standard search order:
    /// 1. `$AEOLUS_CONFIG` environment variable
    /// 2. `./turbine_config.toml` in the current working directory
    /// 3. Built-in defaults (tuned offshore-turbine values)
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var("AEOLUS_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), asset = %config.turbine.asset_id, "Loaded config from AEOLUS_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from AEOLUS_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "AEOLUS_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./turbine_config.toml
        let local = PathBuf::from("turbine_config.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(asset = %config.turbine.asset_id, "Loaded config from ./turbine_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./turbine_config.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No turbine_config.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all tunings for internal consistency.
    ///
    /// Rules:
    /// - Smoothing spans and windows must be > 0
    /// - Baseline min-periods cannot exceed the baseline window
    /// - 0 < failure floor < health ceiling <= 1.0
    /// - Minimum slope and RUL horizon must be positive
    /// - Criticality weights must lie in [0.2, 1.0]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let h = &self.health;
        if h.smoothing_span == 0 {
            errors.push("health.smoothing_span must be > 0".to_string());
        }
        if h.baseline_window == 0 {
            errors.push("health.baseline_window must be > 0".to_string());
        }
        if h.baseline_min_periods == 0 {
            errors.push("health.baseline_min_periods must be > 0".to_string());
        }
        if h.baseline_min_periods > h.baseline_window {
            errors.push(format!(
                "health.baseline_min_periods ({}) cannot exceed baseline_window ({})",
                h.baseline_min_periods, h.baseline_window
            ));
        }
        if !(h.normalization_epsilon > 0.0) {
            errors.push("health.normalization_epsilon must be > 0".to_string());
        }
        if !(h.failure_floor > 0.0 && h.failure_floor < h.ceiling && h.ceiling <= 1.0) {
            errors.push(format!(
                "health floor/ceiling out of order: need 0 < {} < {} <= 1.0",
                h.failure_floor, h.ceiling
            ));
        }

        let r = &self.rul;
        if r.smoothing_span == 0 {
            errors.push("rul.smoothing_span must be > 0".to_string());
        }
        if r.slope_window == 0 {
            errors.push("rul.slope_window must be > 0".to_string());
        }
        if !(r.min_slope_per_hour > 0.0) {
            errors.push("rul.min_slope_per_hour must be > 0".to_string());
        }
        if !(r.max_rul_hours > 0.0) {
            errors.push("rul.max_rul_hours must be > 0".to_string());
        }
        if r.median_smooth_window == 0 {
            errors.push("rul.median_smooth_window must be > 0".to_string());
        }
        if !(r.failure_health >= 0.0 && r.failure_health < 1.0) {
            errors.push(format!(
                "rul.failure_health ({}) must lie in [0, 1)",
                r.failure_health
            ));
        }
        if !(r.flat_decay_factor >= 0.0) {
            errors.push("rul.flat_decay_factor must be >= 0".to_string());
        }

        let s = &self.scheduler;
        if s.lookback_days == 0 {
            errors.push("scheduler.lookback_days must be > 0".to_string());
        }
        if !(s.recency_decay_hours > 0.0) {
            errors.push("scheduler.recency_decay_hours must be > 0".to_string());
        }
        if s.criticality.is_empty() {
            errors.push("scheduler.criticality table cannot be empty".to_string());
        }
        for (subsystem, weight) in &s.criticality {
            if !(0.2..=1.0).contains(weight) {
                errors.push(format!(
                    "scheduler.criticality.{} ({}) must lie in [0.2, 1.0]",
                    subsystem, weight
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Config Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parse error ({0}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Turbine Info
// ============================================================================

/// Identification metadata — not used for logic, but appears in logs and
/// published artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurbineInfo {
    /// Turbine asset identifier
    #[serde(default = "default_asset_id")]
    pub asset_id: String,

    /// Wind farm / site name
    #[serde(default)]
    pub site: String,
}

fn default_asset_id() -> String {
    "TURBINE-01".to_string()
}

impl Default for TurbineInfo {
    fn default() -> Self {
        Self {
            asset_id: default_asset_id(),
            site: String::new(),
        }
    }
}

// ============================================================================
// Health Index Estimator Tuning
// ============================================================================

/// Stage 1 tuning: smoothing, rolling re-baselining, and output bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIndexConfig {
    /// EWMA span (samples) applied to raw anomaly intensity before
    /// normalization. Suppresses single-sample noise.
    #[serde(default = "default_health_smoothing_span")]
    pub smoothing_span: usize,

    /// Trailing window (samples) for the rolling min/max baseline.
    /// Re-baselines severity against recent history rather than a global scale.
    #[serde(default = "default_baseline_window")]
    pub baseline_window: usize,

    /// Samples required before the rolling baseline is considered defined.
    #[serde(default = "default_baseline_min_periods")]
    pub baseline_min_periods: usize,

    /// Additive epsilon guarding the normalization against flat windows.
    #[serde(default = "default_normalization_epsilon")]
    pub normalization_epsilon: f64,

    /// Declared failure floor of the health index.
    #[serde(default = "default_failure_floor")]
    pub failure_floor: f64,

    /// Pristine-condition ceiling of the health index.
    #[serde(default = "default_health_ceiling")]
    pub ceiling: f64,
}

fn default_health_smoothing_span() -> usize {
    60
}
fn default_baseline_window() -> usize {
    500
}
fn default_baseline_min_periods() -> usize {
    50
}
fn default_normalization_epsilon() -> f64 {
    1e-6
}
fn default_failure_floor() -> f64 {
    0.05
}
fn default_health_ceiling() -> f64 {
    1.0
}

impl Default for HealthIndexConfig {
    fn default() -> Self {
        Self {
            smoothing_span: default_health_smoothing_span(),
            baseline_window: default_baseline_window(),
            baseline_min_periods: default_baseline_min_periods(),
            normalization_epsilon: default_normalization_epsilon(),
            failure_floor: default_failure_floor(),
            ceiling: default_health_ceiling(),
        }
    }
}

// ============================================================================
// Real-Time RUL Estimator Tuning
// ============================================================================

/// Stage 2 tuning: slope estimation window, projection limits, post-smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulConfig {
    /// EWMA span (samples) re-applied to the health series before slope
    /// estimation.
    #[serde(default = "default_rul_smoothing_span")]
    pub smoothing_span: usize,

    /// Centered window (samples) for local linear slope estimation.
    #[serde(default = "default_slope_window")]
    pub slope_window: usize,

    /// Minimum meaningful degradation rate (health-units/hour). Slopes below
    /// this are treated as "no measurable degradation".
    #[serde(default = "default_min_slope_per_hour")]
    pub min_slope_per_hour: f64,

    /// Forecast horizon cap (hours). Realistic offshore turbine prediction
    /// horizon.
    #[serde(default = "default_max_rul_hours")]
    pub max_rul_hours: f64,

    /// Health value at which the asset is considered failed.
    #[serde(default = "default_failure_floor")]
    pub failure_health: f64,

    /// Fraction of the median inter-sample interval bled off the previous RUL
    /// on each step with no measurable degradation.
    #[serde(default = "default_flat_decay_factor")]
    pub flat_decay_factor: f64,

    /// Centered median filter window (samples) applied to the raw RUL series.
    #[serde(default = "default_median_smooth_window")]
    pub median_smooth_window: usize,
}

fn default_rul_smoothing_span() -> usize {
    50
}
fn default_slope_window() -> usize {
    40
}
fn default_min_slope_per_hour() -> f64 {
    0.002
}
fn default_max_rul_hours() -> f64 {
    600.0
}
fn default_flat_decay_factor() -> f64 {
    0.5
}
fn default_median_smooth_window() -> usize {
    5
}

impl Default for RulConfig {
    fn default() -> Self {
        Self {
            smoothing_span: default_rul_smoothing_span(),
            slope_window: default_slope_window(),
            min_slope_per_hour: default_min_slope_per_hour(),
            max_rul_hours: default_max_rul_hours(),
            failure_health: default_failure_floor(),
            flat_decay_factor: default_flat_decay_factor(),
            median_smooth_window: default_median_smooth_window(),
        }
    }
}

// ============================================================================
// Maintenance Scheduler Tuning
// ============================================================================

/// Stage 3 tuning: lookback window, recency decay, scoring weights, and the
/// static subsystem criticality table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Trailing span (days) over which recent faults are counted.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Time constant (hours) of the fault-recency exponential decay.
    #[serde(default = "default_recency_decay_hours")]
    pub recency_decay_hours: f64,

    /// Flat recency factor assigned to subsystems with zero recent faults.
    #[serde(default = "default_no_fault_recency_factor")]
    pub no_fault_recency_factor: f64,

    /// Floor (hours) applied to elapsed time since the last fault.
    #[serde(default = "default_min_recency_hours")]
    pub min_recency_hours: f64,

    /// Degradation blend: weight of the recent-fault count.
    #[serde(default = "default_degradation_anomaly_weight")]
    pub degradation_anomaly_weight: f64,

    /// Degradation blend: weight of the recency factor.
    #[serde(default = "default_degradation_recency_weight")]
    pub degradation_recency_weight: f64,

    /// Degradation blend: weight of the static criticality.
    #[serde(default = "default_degradation_criticality_weight")]
    pub degradation_criticality_weight: f64,

    /// Clamp bounds on the blended degradation fraction.
    #[serde(default = "default_degradation_floor")]
    pub degradation_floor: f64,
    #[serde(default = "default_degradation_ceiling")]
    pub degradation_ceiling: f64,

    /// Priority blend: weight of forecast exhaustion.
    #[serde(default = "default_priority_rul_weight")]
    pub priority_rul_weight: f64,

    /// Priority blend: weight of fault frequency.
    #[serde(default = "default_priority_anomaly_weight")]
    pub priority_anomaly_weight: f64,

    /// Priority blend: weight of static criticality.
    #[serde(default = "default_priority_criticality_weight")]
    pub priority_criticality_weight: f64,

    /// Fault count at which the frequency score saturates at 1.0.
    #[serde(default = "default_anomaly_saturation_count")]
    pub anomaly_saturation_count: f64,

    /// Static per-subsystem importance weights in [0.2, 1.0].
    #[serde(default = "default_criticality_table")]
    pub criticality: BTreeMap<Subsystem, f64>,
}

fn default_lookback_days() -> u32 {
    30
}
fn default_recency_decay_hours() -> f64 {
    72.0
}
fn default_no_fault_recency_factor() -> f64 {
    0.1
}
fn default_min_recency_hours() -> f64 {
    1.0
}
fn default_degradation_anomaly_weight() -> f64 {
    0.15
}
fn default_degradation_recency_weight() -> f64 {
    0.50
}
fn default_degradation_criticality_weight() -> f64 {
    0.35
}
fn default_degradation_floor() -> f64 {
    0.05
}
fn default_degradation_ceiling() -> f64 {
    0.9
}
fn default_priority_rul_weight() -> f64 {
    0.5
}
fn default_priority_anomaly_weight() -> f64 {
    0.3
}
fn default_priority_criticality_weight() -> f64 {
    0.2
}
fn default_anomaly_saturation_count() -> f64 {
    12.0
}

/// Default criticality table for an offshore direct-drive-less (geared)
/// turbine: drivetrain components dominate, environmental signals rank lowest.
fn default_criticality_table() -> BTreeMap<Subsystem, f64> {
    BTreeMap::from([
        (Subsystem::Gearbox, 1.0),
        (Subsystem::Generator, 1.0),
        (Subsystem::PowerElectronics, 0.9),
        (Subsystem::Shaft, 0.9),
        (Subsystem::Rotor, 0.7),
        (Subsystem::Pitch, 0.7),
        (Subsystem::Yaw, 0.6),
        (Subsystem::Tower, 0.6),
        (Subsystem::Grid, 0.5),
        (Subsystem::Environment, 0.2),
        (Subsystem::Unknown, 0.5),
    ])
}

impl SchedulerConfig {
    /// Criticality weight for a subsystem, falling back to the `Unknown`
    /// entry (0.5 by default) for table gaps.
    pub fn criticality_for(&self, subsystem: Subsystem) -> f64 {
        self.criticality
            .get(&subsystem)
            .or_else(|| self.criticality.get(&Subsystem::Unknown))
            .copied()
            .unwrap_or(0.5)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            recency_decay_hours: default_recency_decay_hours(),
            no_fault_recency_factor: default_no_fault_recency_factor(),
            min_recency_hours: default_min_recency_hours(),
            degradation_anomaly_weight: default_degradation_anomaly_weight(),
            degradation_recency_weight: default_degradation_recency_weight(),
            degradation_criticality_weight: default_degradation_criticality_weight(),
            degradation_floor: default_degradation_floor(),
            degradation_ceiling: default_degradation_ceiling(),
            priority_rul_weight: default_priority_rul_weight(),
            priority_anomaly_weight: default_priority_anomaly_weight(),
            priority_criticality_weight: default_priority_criticality_weight(),
            anomaly_saturation_count: default_anomaly_saturation_count(),
            criticality: default_criticality_table(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tuned_parameters() {
        let config = PrognosticsConfig::default();
        assert_eq!(config.health.smoothing_span, 60);
        assert_eq!(config.health.baseline_window, 500);
        assert_eq!(config.health.baseline_min_periods, 50);
        assert_eq!(config.rul.slope_window, 40);
        assert!((config.rul.min_slope_per_hour - 0.002).abs() < 1e-12);
        assert!((config.rul.max_rul_hours - 600.0).abs() < 1e-12);
        assert_eq!(config.scheduler.lookback_days, 30);
        assert!((config.scheduler.recency_decay_hours - 72.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(PrognosticsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_criticality_table_complete() {
        let config = PrognosticsConfig::default();
        for sub in Subsystem::ALL {
            assert!(
                config.scheduler.criticality.contains_key(&sub),
                "missing criticality for {}",
                sub
            );
        }
        assert!((config.scheduler.criticality_for(Subsystem::Gearbox) - 1.0).abs() < 1e-12);
        assert!((config.scheduler.criticality_for(Subsystem::Unknown) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_validation_rejects_bad_criticality() {
        let mut config = PrognosticsConfig::default();
        config
            .scheduler
            .criticality
            .insert(Subsystem::Grid, 1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_min_periods_above_window() {
        let mut config = PrognosticsConfig::default();
        config.health.baseline_min_periods = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_preserves_criticality_keys() {
        let config = PrognosticsConfig::default();
        let toml_str = config.to_toml().expect("serialize");
        assert!(toml_str.contains("GEARBOX"));
        let parsed: PrognosticsConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.scheduler.criticality, config.scheduler.criticality);
    }
}
