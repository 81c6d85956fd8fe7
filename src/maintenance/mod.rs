//! Predictive Maintenance Scheduler
//!
//! Combines the latest RUL forecast with recent per-subsystem fault history
//! and static criticality weights into a ranked maintenance action list.
//! The weighted blend mixes three orthogonal risk signals — forecast
//! exhaustion, fault frequency, and intrinsic subsystem importance — into
//! one rankable score without requiring calibrated probabilities.
//!
//! The scheduler owns record creation and ranking; consumers treat the
//! resulting set as read-only. It is recomputed in full on every run.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::types::{AnomalySample, MaintenanceRecord, RecommendedAction, RulSample, Subsystem};

/// Per-subsystem fault statistics inside the lookback window.
#[derive(Debug, Clone, Copy)]
struct FaultStats {
    count: usize,
    last_seen: DateTime<Utc>,
}

/// Predictive Maintenance Scheduler (stage 3 of the prognostics pipeline).
pub struct MaintenanceScheduler<'a> {
    config: &'a SchedulerConfig,
}

impl<'a> MaintenanceScheduler<'a> {
    pub fn new(config: &'a SchedulerConfig) -> Self {
        Self { config }
    }

    /// Build the maintenance schedule from the latest forecast point and the
    /// labeled anomaly history.
    ///
    /// Produces exactly one record per criticality-table entry, sorted
    /// descending by priority score (ties broken by subsystem order, so the
    /// ranking is deterministic).
    pub fn schedule(
        &self,
        latest: &RulSample,
        anomalies: &[AnomalySample],
    ) -> Vec<MaintenanceRecord> {
        let cfg = self.config;
        let now = latest.timestamp;
        let base_rul = latest.rul_hours;

        let stats = self.collect_fault_stats(now, anomalies);

        let mut records: Vec<MaintenanceRecord> = cfg
            .criticality
            .iter()
            .map(|(&subsystem, &criticality)| {
                self.build_record(
                    subsystem,
                    criticality,
                    now,
                    base_rul,
                    stats.get(&subsystem).copied(),
                )
            })
            .collect();

        // BTreeMap iteration order + stable sort keeps equal scores ordered
        records.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            records = records.len(),
            base_rul_hours = base_rul,
            top = %records.first().map_or(Subsystem::Unknown, |r| r.subsystem),
            "maintenance schedule produced"
        );
        records
    }

    /// Count labeled faults per subsystem inside the trailing lookback
    /// window, tracking when each subsystem last faulted.
    fn collect_fault_stats(
        &self,
        now: DateTime<Utc>,
        anomalies: &[AnomalySample],
    ) -> BTreeMap<Subsystem, FaultStats> {
        let cutoff = now - Duration::days(i64::from(self.config.lookback_days));

        let mut stats: BTreeMap<Subsystem, FaultStats> = BTreeMap::new();
        for sample in anomalies {
            let Some(subsystem) = sample.subsystem else {
                continue;
            };
            if sample.timestamp < cutoff {
                continue;
            }
            stats
                .entry(subsystem)
                .and_modify(|s| {
                    s.count += 1;
                    s.last_seen = s.last_seen.max(sample.timestamp);
                })
                .or_insert(FaultStats {
                    count: 1,
                    last_seen: sample.timestamp,
                });
        }
        stats
    }

    fn build_record(
        &self,
        subsystem: Subsystem,
        criticality: f64,
        now: DateTime<Utc>,
        base_rul: f64,
        stats: Option<FaultStats>,
    ) -> MaintenanceRecord {
        let cfg = self.config;

        let (anom_count, recency_factor) = match stats {
            // Flat constant for fault-free subsystems, by contract —
            // not a function of elapsed time since a known-good state
            None => (0, cfg.no_fault_recency_factor),
            Some(s) => {
                let recency_hours = hours_between(s.last_seen, now).max(cfg.min_recency_hours);
                (s.count, (-recency_hours / cfg.recency_decay_hours).exp())
            }
        };

        let degradation = (cfg.degradation_anomaly_weight * anom_count as f64
            + cfg.degradation_recency_weight * recency_factor
            + cfg.degradation_criticality_weight * criticality)
            .clamp(cfg.degradation_floor, cfg.degradation_ceiling);

        let effective_rul = base_rul * (1.0 - degradation);

        let score_rul = 1.0 - effective_rul / base_rul.max(1.0);
        let score_anom = (anom_count as f64 / cfg.anomaly_saturation_count).min(1.0);
        let priority_score = cfg.priority_rul_weight * score_rul
            + cfg.priority_anomaly_weight * score_anom
            + cfg.priority_criticality_weight * criticality;

        MaintenanceRecord {
            subsystem,
            base_rul_hours: base_rul,
            effective_rul_hours: effective_rul,
            recent_anomaly_count: anom_count,
            criticality,
            recency_factor,
            priority_score,
            predicted_due: now + duration_from_hours(effective_rul),
            recommended_action: RecommendedAction::from_effective_rul(effective_rul),
        }
    }
}

fn hours_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 3_600_000.0
}

fn duration_from_hours(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).single().expect("valid date")
    }

    fn latest_rul(base: f64) -> RulSample {
        RulSample {
            timestamp: now(),
            health_index: 0.5,
            slope_per_hour: -0.005,
            rul_hours: base,
        }
    }

    fn fault(hours_ago: i64, subsystem: Subsystem) -> AnomalySample {
        AnomalySample {
            timestamp: now() - Duration::hours(hours_ago),
            intensity: 1.0,
            subsystem: Some(subsystem),
        }
    }

    #[test]
    fn test_one_record_per_table_entry_sorted_descending() {
        let config = SchedulerConfig::default();
        let records = MaintenanceScheduler::new(&config).schedule(&latest_rul(300.0), &[]);
        assert_eq!(records.len(), config.criticality.len());
        for w in records.windows(2) {
            assert!(w[0].priority_score >= w[1].priority_score);
        }
    }

    #[test]
    fn test_gearbox_fault_storm_forces_emergency() {
        // base_rul = 200 h, 5 gearbox faults, most recent 1 h ago:
        // recency = exp(-1/72) ~= 0.9862
        // degradation = clip(0.15*5 + 0.50*0.9862 + 0.35*1.0, 0.05, 0.9) = 0.9
        // effective = 200 * 0.1 = 20 h -> Emergency Shutdown & Repair
        let config = SchedulerConfig::default();
        let anomalies: Vec<AnomalySample> = [1, 5, 20, 100, 200]
            .into_iter()
            .map(|h| fault(h, Subsystem::Gearbox))
            .collect();

        let records =
            MaintenanceScheduler::new(&config).schedule(&latest_rul(200.0), &anomalies);
        let gearbox = records
            .iter()
            .find(|r| r.subsystem == Subsystem::Gearbox)
            .expect("gearbox record");

        assert_eq!(gearbox.recent_anomaly_count, 5);
        assert!((gearbox.recency_factor - (-1.0_f64 / 72.0).exp()).abs() < 1e-9);
        assert!((gearbox.effective_rul_hours - 20.0).abs() < 1e-9);
        assert_eq!(
            gearbox.recommended_action,
            RecommendedAction::EmergencyShutdownRepair
        );
        // score_rul = 0.9, score_anom = 5/12, criticality = 1.0
        let expected_priority = 0.5 * 0.9 + 0.3 * (5.0 / 12.0) + 0.2;
        assert!((gearbox.priority_score - expected_priority).abs() < 1e-9);
        // predicted due 20 h out
        assert_eq!(gearbox.predicted_due, now() + Duration::hours(20));
        // and it outranks everything else
        assert_eq!(records[0].subsystem, Subsystem::Gearbox);
    }

    #[test]
    fn test_no_fault_subsystem_gets_flat_recency() {
        let config = SchedulerConfig::default();
        // Ancient fault outside the 30-day window must not count
        let anomalies = vec![fault(31 * 24, Subsystem::Yaw)];
        let records =
            MaintenanceScheduler::new(&config).schedule(&latest_rul(400.0), &anomalies);
        let yaw = records
            .iter()
            .find(|r| r.subsystem == Subsystem::Yaw)
            .expect("yaw record");
        assert_eq!(yaw.recent_anomaly_count, 0);
        assert!((yaw.recency_factor - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_recency_floor_is_one_hour() {
        let config = SchedulerConfig::default();
        // Fault "now": elapsed 0 h floors at 1 h
        let anomalies = vec![fault(0, Subsystem::Rotor)];
        let records =
            MaintenanceScheduler::new(&config).schedule(&latest_rul(300.0), &anomalies);
        let rotor = records
            .iter()
            .find(|r| r.subsystem == Subsystem::Rotor)
            .expect("rotor record");
        assert!((rotor.recency_factor - (-1.0_f64 / 72.0).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_unlabeled_samples_are_ignored() {
        let config = SchedulerConfig::default();
        let mut sample = fault(2, Subsystem::Gearbox);
        sample.subsystem = None;
        let records = MaintenanceScheduler::new(&config).schedule(&latest_rul(300.0), &[sample]);
        for r in &records {
            assert_eq!(r.recent_anomaly_count, 0);
        }
    }

    #[test]
    fn test_degradation_floor_applies_to_quiet_low_criticality() {
        // ENVIRONMENT with no faults: 0.15*0 + 0.5*0.1 + 0.35*0.2 = 0.12
        // (above the 0.05 floor), effective = base * 0.88
        let config = SchedulerConfig::default();
        let records = MaintenanceScheduler::new(&config).schedule(&latest_rul(100.0), &[]);
        let env = records
            .iter()
            .find(|r| r.subsystem == Subsystem::Environment)
            .expect("environment record");
        assert!((env.effective_rul_hours - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_base_rul_scores_safely() {
        // Exhausted forecast: score_rul denominator floors at 1, no NaN
        let config = SchedulerConfig::default();
        let records = MaintenanceScheduler::new(&config).schedule(&latest_rul(0.0), &[]);
        for r in &records {
            assert!(r.priority_score.is_finite());
            assert_eq!(
                r.recommended_action,
                RecommendedAction::EmergencyShutdownRepair
            );
        }
    }

    #[test]
    fn test_idempotence() {
        let config = SchedulerConfig::default();
        let anomalies: Vec<AnomalySample> = (1..40)
            .map(|h| fault(h * 7, Subsystem::ALL[h as usize % 11]))
            .collect();
        let scheduler = MaintenanceScheduler::new(&config);
        let a = scheduler.schedule(&latest_rul(250.0), &anomalies);
        let b = scheduler.schedule(&latest_rul(250.0), &anomalies);
        assert_eq!(a, b);
    }
}
