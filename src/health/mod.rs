//! Health Index Estimator
//!
//! Converts a raw anomaly-intensity series into a bounded, monotonically
//! non-increasing health score. The estimator re-baselines severity against
//! *recent* history (a trailing rolling min/max) rather than a global scale,
//! so health reacts to relative, not absolute, anomaly intensity — an
//! autoencoder whose reconstruction error drifts upward over months still
//! produces a meaningful index.
//!
//! ## Algorithm
//!
//! 1. EWMA-smooth the raw intensity (span 60 by default)
//! 2. Rolling min/max over the trailing baseline window (500 samples,
//!    defined from 50)
//! 3. Normalize into [0, 1] against that rolling range (epsilon-guarded)
//! 4. Invert: health = 1 - normalized severity
//! 5. Monotonic ratchet — health can degrade or hold, never recover
//! 6. Clip to [failure floor, ceiling]
//!
//! Recovery after a repair is represented upstream by restarting the series,
//! not by this estimator.

use tracing::{debug, warn};

use crate::config::HealthIndexConfig;
use crate::stats::{ewma_adjusted, rolling_extrema};
use crate::types::{AnomalySample, HealthSample};

/// Errors from the health index stage.
///
/// Schema problems (missing columns) are caught at ingest; by the time data
/// reaches this estimator the only fatal condition left is an empty series.
#[derive(Debug, thiserror::Error)]
pub enum HealthIndexError {
    #[error("anomaly-intensity series is empty")]
    EmptyInput,
}

/// Health Index Estimator (stage 1 of the prognostics pipeline).
///
/// Pure batch transform: same input and config always produce the same
/// output. Construction is cheap; the struct only borrows tuning.
pub struct HealthIndexEstimator<'a> {
    config: &'a HealthIndexConfig,
}

impl<'a> HealthIndexEstimator<'a> {
    pub fn new(config: &'a HealthIndexConfig) -> Self {
        Self { config }
    }

    /// Produce the health series for an ordered anomaly-intensity series.
    ///
    /// Input must be non-empty and ordered ascending by timestamp (ties and
    /// invalid timestamps are dropped by the caller). Output has exactly one
    /// sample per input sample.
    pub fn estimate(
        &self,
        samples: &[AnomalySample],
    ) -> Result<Vec<HealthSample>, HealthIndexError> {
        if samples.is_empty() {
            return Err(HealthIndexError::EmptyInput);
        }
        let cfg = self.config;

        let intensity: Vec<f64> = samples.iter().map(|s| s.intensity).collect();

        // 1. Suppress single-sample noise before thresholding
        let smoothed = ewma_adjusted(&intensity, cfg.smoothing_span);

        // 2. Trailing rolling baseline; undefined until min_periods samples
        let extrema = rolling_extrema(&smoothed, cfg.baseline_window, cfg.baseline_min_periods);

        // 3-4. Normalize against the rolling range, invert to raw health
        let health_raw: Vec<Option<f64>> = smoothed
            .iter()
            .zip(extrema.iter())
            .map(|(&s, window)| {
                window.map(|(min, max)| {
                    let norm = (s - min) / (max - min + cfg.normalization_epsilon);
                    1.0 - norm.clamp(0.0, 1.0)
                })
            })
            .collect();

        // 5. Back-fill the undefined warm-up prefix with the first defined
        // value, then apply the ratchet. A series too short to ever define a
        // baseline carries no degradation evidence and reports pristine.
        let seed = health_raw.iter().flatten().next().copied();
        if seed.is_none() {
            warn!(
                samples = samples.len(),
                min_periods = cfg.baseline_min_periods,
                "series shorter than baseline warm-up — reporting pristine health"
            );
        }
        let seed = seed.unwrap_or(cfg.ceiling);

        let mut out = Vec::with_capacity(samples.len());
        let mut floor_so_far = f64::INFINITY;
        for (sample, raw) in samples.iter().zip(health_raw.iter()) {
            let value = raw.unwrap_or(seed);
            floor_so_far = floor_so_far.min(value);

            // 6. Failure floor / pristine ceiling
            let health_index = floor_so_far.clamp(cfg.failure_floor, cfg.ceiling);
            out.push(HealthSample {
                timestamp: sample.timestamp,
                health_index,
            });
        }

        debug!(
            samples = out.len(),
            final_health = out.last().map_or(f64::NAN, |s| s.health_index),
            "health index series produced"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_series(intensities: &[f64]) -> Vec<AnomalySample> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single().expect("valid date");
        intensities
            .iter()
            .enumerate()
            .map(|(i, &intensity)| AnomalySample {
                timestamp: start + Duration::hours(i as i64),
                intensity,
                subsystem: None,
            })
            .collect()
    }

    fn estimate(intensities: &[f64]) -> Vec<HealthSample> {
        let config = HealthIndexConfig::default();
        HealthIndexEstimator::new(&config)
            .estimate(&make_series(intensities))
            .expect("non-empty input")
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let config = HealthIndexConfig::default();
        let result = HealthIndexEstimator::new(&config).estimate(&[]);
        assert!(matches!(result, Err(HealthIndexError::EmptyInput)));
    }

    #[test]
    fn test_output_length_matches_input() {
        let intensities: Vec<f64> = (0..200).map(|i| f64::from(i) * 0.01).collect();
        assert_eq!(estimate(&intensities).len(), 200);
    }

    #[test]
    fn test_monotonic_ratchet() {
        // Noisy but generally rising intensity: health must never recover
        let intensities: Vec<f64> = (0..600)
            .map(|i| f64::from(i) * 0.01 + if i % 7 == 0 { -0.5 } else { 0.3 })
            .collect();
        let health = estimate(&intensities);
        for w in health.windows(2) {
            assert!(
                w[1].health_index <= w[0].health_index + 1e-12,
                "health recovered: {} -> {}",
                w[0].health_index,
                w[1].health_index
            );
        }
    }

    #[test]
    fn test_bounds() {
        let intensities: Vec<f64> = (0..1000).map(|i| (f64::from(i) * 0.37).sin().abs() * 10.0).collect();
        for s in estimate(&intensities) {
            assert!(s.health_index >= 0.05 && s.health_index <= 1.0);
        }
    }

    #[test]
    fn test_fault_onset_degrades_health() {
        // Flat healthy baseline, then a ramp to 10x the baseline level
        let mut intensities = vec![0.5; 300];
        intensities.extend((0..300).map(|i| 0.5 + f64::from(i) * 0.015));
        let health = estimate(&intensities);
        let first = health.first().expect("non-empty").health_index;
        let last = health.last().expect("non-empty").health_index;
        assert!(
            last < first,
            "fault onset must degrade health ({first} -> {last})"
        );
        // The flat baseline itself reads as pristine
        assert!((health[100].health_index - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_series_reports_pristine() {
        // 10 samples < 50 min-periods: no baseline ever defined
        let intensities = vec![5.0; 10];
        let health = estimate(&intensities);
        for s in health {
            assert!((s.health_index - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_warmup_prefix_backfilled_from_first_defined_value() {
        let intensities: Vec<f64> = (0..80).map(|i| f64::from(i) * 0.1).collect();
        let health = estimate(&intensities);
        // Positions 0..49 are undefined and back-filled: all equal position 49
        let seeded = health[49].health_index;
        for s in &health[..49] {
            assert!((s.health_index - seeded).abs() < 1e-12);
        }
    }

    #[test]
    fn test_idempotence() {
        let intensities: Vec<f64> = (0..300).map(|i| (f64::from(i) * 0.11).cos() + 1.0).collect();
        let a = estimate(&intensities);
        let b = estimate(&intensities);
        assert_eq!(a, b);
    }
}
