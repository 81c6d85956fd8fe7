//! Shared data structures for the turbine prognostics pipeline
//!
//! This module defines the core types flowing through the three estimator
//! stages:
//! - Stage 1: AnomalySample (anomaly-intensity stream in), HealthSample (out)
//! - Stage 2: RulSample (remaining-useful-life forecast)
//! - Stage 3: MaintenanceRecord (ranked per-subsystem schedule)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Stage 1 Input: Anomaly-Intensity Stream
// ============================================================================

/// One observation from the upstream anomaly-detection + root-cause layer.
///
/// `intensity` is any monotone-in-severity scalar: an anomaly score, an
/// autoencoder reconstruction error, or a 0/1 anomaly flag. Which one it was
/// is decided at ingest time; the estimators only see the scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySample {
    /// Observation time (UTC). Sequences are ordered ascending.
    pub timestamp: DateTime<Utc>,
    /// Monotone-in-severity anomaly intensity.
    pub intensity: f64,
    /// Subsystem implicated by root-cause analysis, when available.
    pub subsystem: Option<Subsystem>,
}

// ============================================================================
// Stage 1 Output: Health Index
// ============================================================================

/// A single point of the bounded, monotonically non-increasing health series.
///
/// Invariant: within one produced sequence, `health_index` never increases
/// (the ratchet) and stays inside [0.05, 1.0]. Recovery only happens through
/// an external maintenance event, which is outside this estimator's scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    /// Asset condition: 1.0 = pristine, 0.05 = at the failure floor.
    pub health_index: f64,
}

// ============================================================================
// Stage 2 Output: Real-Time RUL
// ============================================================================

/// A single point of the remaining-useful-life forecast.
///
/// Carries its own smoothed copy of the health index for audit/display.
/// Invariants: `rul_hours` is non-increasing across a sequence and bounded
/// by [0, max_rul_hours]; `slope_per_hour` is never positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RulSample {
    pub timestamp: DateTime<Utc>,
    /// EWMA-smoothed health index used for this forecast point.
    pub health_index: f64,
    /// Local degradation rate in health-units per hour (<= 0).
    pub slope_per_hour: f64,
    /// Forecast hours until health reaches the failure floor.
    pub rul_hours: f64,
}

// ============================================================================
// Subsystems
// ============================================================================

/// Turbine subsystems known to root-cause analysis and the criticality table.
///
/// The set is closed: labels that don't match any known subsystem map to
/// `Unknown` rather than failing the run.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subsystem {
    Gearbox,
    Generator,
    PowerElectronics,
    Shaft,
    Rotor,
    Pitch,
    Yaw,
    Tower,
    Grid,
    Environment,
    Unknown,
}

impl Subsystem {
    /// All subsystems in declaration order (used to build the default
    /// criticality table and to give scheduler output a stable order).
    pub const ALL: [Subsystem; 11] = [
        Subsystem::Gearbox,
        Subsystem::Generator,
        Subsystem::PowerElectronics,
        Subsystem::Shaft,
        Subsystem::Rotor,
        Subsystem::Pitch,
        Subsystem::Yaw,
        Subsystem::Tower,
        Subsystem::Grid,
        Subsystem::Environment,
        Subsystem::Unknown,
    ];

    /// Canonical label as used in upstream artifacts and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Gearbox => "GEARBOX",
            Subsystem::Generator => "GENERATOR",
            Subsystem::PowerElectronics => "POWER_ELECTRONICS",
            Subsystem::Shaft => "SHAFT",
            Subsystem::Rotor => "ROTOR",
            Subsystem::Pitch => "PITCH",
            Subsystem::Yaw => "YAW",
            Subsystem::Tower => "TOWER",
            Subsystem::Grid => "GRID",
            Subsystem::Environment => "ENVIRONMENT",
            Subsystem::Unknown => "UNKNOWN",
        }
    }

    /// Parse a root-cause label, case-insensitively. Unrecognized labels
    /// (including empty ones) fold into `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "GEARBOX" => Subsystem::Gearbox,
            "GENERATOR" => Subsystem::Generator,
            "POWER_ELECTRONICS" => Subsystem::PowerElectronics,
            "SHAFT" => Subsystem::Shaft,
            "ROTOR" => Subsystem::Rotor,
            "PITCH" => Subsystem::Pitch,
            "YAW" => Subsystem::Yaw,
            "TOWER" => Subsystem::Tower,
            "GRID" => Subsystem::Grid,
            "ENVIRONMENT" => Subsystem::Environment,
            _ => Subsystem::Unknown,
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Stage 3 Output: Maintenance Schedule
// ============================================================================

/// Maintenance urgency tier, derived from effective RUL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecommendedAction {
    /// Effective RUL below 24 hours.
    EmergencyShutdownRepair,
    /// Effective RUL below 72 hours.
    ImmediateMaintenance,
    /// Effective RUL below one week (168 hours).
    HighPriorityMaintenance,
    /// Effective RUL below 500 hours.
    ScheduleMaintenance,
    /// No near-term action required.
    RoutineMonitoring,
}

impl RecommendedAction {
    /// Threshold the effective RUL into an action tier.
    pub fn from_effective_rul(effective_rul_hours: f64) -> Self {
        if effective_rul_hours < 24.0 {
            RecommendedAction::EmergencyShutdownRepair
        } else if effective_rul_hours < 72.0 {
            RecommendedAction::ImmediateMaintenance
        } else if effective_rul_hours < 168.0 {
            RecommendedAction::HighPriorityMaintenance
        } else if effective_rul_hours < 500.0 {
            RecommendedAction::ScheduleMaintenance
        } else {
            RecommendedAction::RoutineMonitoring
        }
    }

    /// Operator-facing description, as published in the schedule artifact.
    pub fn display_name(&self) -> &'static str {
        match self {
            RecommendedAction::EmergencyShutdownRepair => "Emergency Shutdown & Repair",
            RecommendedAction::ImmediateMaintenance => "Immediate Maintenance (48-72 hrs)",
            RecommendedAction::HighPriorityMaintenance => "High Priority Maintenance (1 week)",
            RecommendedAction::ScheduleMaintenance => "Schedule Maintenance (2-3 weeks)",
            RecommendedAction::RoutineMonitoring => "Routine Monitoring Only",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One row of the prioritized maintenance schedule.
///
/// The scheduler produces exactly one record per criticality-table entry,
/// sorted descending by `priority_score`. Consumers treat the set as
/// read-only; it is recomputed in full on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub subsystem: Subsystem,
    /// Asset-level RUL from the latest forecast point.
    pub base_rul_hours: f64,
    /// Base RUL discounted by subsystem-specific degradation.
    pub effective_rul_hours: f64,
    /// Faults attributed to this subsystem inside the lookback window.
    pub recent_anomaly_count: usize,
    /// Static importance weight from the criticality table, in [0, 1].
    pub criticality: f64,
    /// Exponential fault-recency weight in (0, 1]; flat 0.1 when no faults.
    pub recency_factor: f64,
    /// Rankable blend of forecast exhaustion, fault frequency, criticality.
    pub priority_score: f64,
    /// Now + effective RUL.
    pub predicted_due: DateTime<Utc>,
    pub recommended_action: RecommendedAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_label_roundtrip() {
        for sub in Subsystem::ALL {
            assert_eq!(Subsystem::from_label(sub.as_str()), sub);
        }
    }

    #[test]
    fn test_subsystem_label_case_insensitive() {
        assert_eq!(Subsystem::from_label("gearbox"), Subsystem::Gearbox);
        assert_eq!(
            Subsystem::from_label("  Power_Electronics "),
            Subsystem::PowerElectronics
        );
    }

    #[test]
    fn test_subsystem_unrecognized_folds_to_unknown() {
        assert_eq!(Subsystem::from_label("FLUX_CAPACITOR"), Subsystem::Unknown);
        assert_eq!(Subsystem::from_label(""), Subsystem::Unknown);
    }

    #[test]
    fn test_action_tiers() {
        use RecommendedAction::*;
        assert_eq!(RecommendedAction::from_effective_rul(3.0), EmergencyShutdownRepair);
        assert_eq!(RecommendedAction::from_effective_rul(24.0), ImmediateMaintenance);
        assert_eq!(RecommendedAction::from_effective_rul(100.0), HighPriorityMaintenance);
        assert_eq!(RecommendedAction::from_effective_rul(300.0), ScheduleMaintenance);
        assert_eq!(RecommendedAction::from_effective_rul(500.0), RoutineMonitoring);
    }

    #[test]
    fn test_action_boundaries_are_half_open() {
        // Each tier is [lower, upper): exactly 72h already falls in the next band
        assert_eq!(
            RecommendedAction::from_effective_rul(71.999),
            RecommendedAction::ImmediateMaintenance
        );
        assert_eq!(
            RecommendedAction::from_effective_rul(72.0),
            RecommendedAction::HighPriorityMaintenance
        );
    }
}
