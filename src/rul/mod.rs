//! Real-Time RUL Estimator
//!
//! Converts the health series into an hours-to-failure forecast. Two naive
//! failure modes of "distance to threshold over slope" estimators are
//! designed out:
//!
//! - **Division blow-up** when degradation is momentarily flat: below the
//!   minimum meaningful slope the estimator switches to a slow time-based
//!   decay of the previous forecast instead of dividing by noise.
//! - **RUL recovery** when the window briefly shows a shallower slope: a
//!   monotonic ratchet caps every forecast at its predecessor.
//!
//! The projection is the one genuinely sequential computation in the
//! pipeline — `rul[i]` depends on `rul[i-1]` — and is written as an explicit
//! fold over the ordered series.

use tracing::{debug, warn};

use crate::config::RulConfig;
use crate::stats::{ewma_recursive, median, median_filter_centered, rolling_ols_slope};
use crate::types::{HealthSample, RulSample};

/// Additive guard on slope denominators.
const SLOPE_EPSILON: f64 = 1e-9;

/// Errors from the RUL stage.
#[derive(Debug, thiserror::Error)]
pub enum RulError {
    #[error("health series is empty")]
    EmptyInput,
}

/// Real-Time RUL Estimator (stage 2 of the prognostics pipeline).
pub struct RulEstimator<'a> {
    config: &'a RulConfig,
}

impl<'a> RulEstimator<'a> {
    pub fn new(config: &'a RulConfig) -> Self {
        Self { config }
    }

    /// Produce the RUL forecast for an ordered health series.
    ///
    /// Output has exactly one sample per input sample; `rul_hours` is
    /// non-increasing and bounded by [0, max_rul_hours].
    pub fn estimate(&self, samples: &[HealthSample]) -> Result<Vec<RulSample>, RulError> {
        if samples.is_empty() {
            return Err(RulError::EmptyInput);
        }
        let cfg = self.config;

        // Re-smooth health before differentiating it
        let health: Vec<f64> = samples.iter().map(|s| s.health_index).collect();
        let health_smooth = ewma_recursive(&health, cfg.smoothing_span);

        let dt_median_hours = median_interval_hours(samples);

        // Local linear slope, converted from per-sample to per-hour units.
        // Undefined windows degrade to slope 0; apparent upward slopes are
        // noise (health cannot physically improve) and clip to 0.
        let slope_per_hour: Vec<f64> = rolling_ols_slope(&health_smooth, cfg.slope_window)
            .into_iter()
            .map(|s| s.map_or(0.0, |v| (v / dt_median_hours).min(0.0)))
            .collect();

        // Sequential projection: fold carrying the previous forecast
        let raw_rul = self.project_sequential(&health_smooth, &slope_per_hour, dt_median_hours);

        // Post-smoothing: centered median filter kills single-sample spikes,
        // then re-clip and forward-fill any non-finite stragglers
        let mut rul = median_filter_centered(&raw_rul, cfg.median_smooth_window);
        let mut last_valid: Option<f64> = None;
        for v in &mut rul {
            if v.is_finite() {
                *v = v.clamp(0.0, cfg.max_rul_hours);
                last_valid = Some(*v);
            } else {
                *v = last_valid.unwrap_or(cfg.max_rul_hours);
            }
        }

        let out: Vec<RulSample> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| RulSample {
                timestamp: s.timestamp,
                health_index: health_smooth[i],
                slope_per_hour: slope_per_hour[i],
                rul_hours: rul[i],
            })
            .collect();

        debug!(
            samples = out.len(),
            median_interval_hours = dt_median_hours,
            final_rul_hours = out.last().map_or(f64::NAN, |s| s.rul_hours),
            "RUL series produced"
        );
        Ok(out)
    }

    /// Stateful single pass in time order.
    ///
    /// Below the minimum meaningful slope the previous forecast bleeds down
    /// by `flat_decay_factor` of the median interval per step — accumulating
    /// operational risk, not a frozen forecast. Otherwise: linear
    /// extrapolation to the failure floor, ratcheted against the predecessor.
    fn project_sequential(
        &self,
        health_smooth: &[f64],
        slope_per_hour: &[f64],
        dt_median_hours: f64,
    ) -> Vec<f64> {
        let cfg = self.config;
        let mut out = Vec::with_capacity(health_smooth.len());
        let mut prev_rul: Option<f64> = None;

        for (&h, &s) in health_smooth.iter().zip(slope_per_hour) {
            let mut rul = if s.abs() < cfg.min_slope_per_hour {
                match prev_rul {
                    // No degradation visible yet: assume the worst measurable
                    // rate rather than an infinite horizon
                    None => ((h - cfg.failure_health) / (cfg.min_slope_per_hour + SLOPE_EPSILON))
                        .clamp(1.0, cfg.max_rul_hours),
                    Some(prev) => prev - dt_median_hours * cfg.flat_decay_factor,
                }
            } else {
                ((h - cfg.failure_health) / (s.abs() + SLOPE_EPSILON))
                    .clamp(0.0, cfg.max_rul_hours)
            };

            if let Some(prev) = prev_rul {
                rul = rul.min(prev);
            }
            out.push(rul);
            prev_rul = Some(rul);
        }
        out
    }
}

/// Median inter-sample interval of the whole sequence, in hours.
///
/// Falls back to 1.0 for degenerate sequences (single sample, duplicate or
/// reversed timestamps) so downstream divisions stay finite.
fn median_interval_hours(samples: &[HealthSample]) -> f64 {
    let diffs: Vec<f64> = samples
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 3_600_000.0)
        .collect();

    match median(&diffs) {
        Some(m) if m.is_finite() && m > 0.0 => m,
        _ => {
            if !diffs.is_empty() {
                warn!("non-positive median sample interval — falling back to 1 hour");
            }
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single().expect("valid date")
    }

    fn hourly_series(health: &[f64]) -> Vec<HealthSample> {
        health
            .iter()
            .enumerate()
            .map(|(i, &h)| HealthSample {
                timestamp: start() + Duration::hours(i as i64),
                health_index: h,
            })
            .collect()
    }

    fn estimate(health: &[f64]) -> Vec<RulSample> {
        let config = RulConfig::default();
        RulEstimator::new(&config)
            .estimate(&hourly_series(health))
            .expect("non-empty input")
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let config = RulConfig::default();
        assert!(matches!(
            RulEstimator::new(&config).estimate(&[]),
            Err(RulError::EmptyInput)
        ));
    }

    #[test]
    fn test_flat_signal_first_sample_and_decay() {
        // Constant pristine health: slope 0 everywhere.
        // First raw forecast = clip((1.0 - 0.05) / 0.002, 1, 600) = 475 hours,
        // then a 0.5 h bleed-down per hourly step.
        let rul = estimate(&[1.0; 20]);

        // Raw sequence is 475, 474.5, 474, ... — the centered median filter
        // shifts only the two edge samples
        assert!((rul[2].rul_hours - 474.0).abs() < 1e-3);
        assert!((rul[10].rul_hours - 470.0).abs() < 1e-3);

        for s in &rul {
            assert!(s.rul_hours <= 475.0 + 1e-9);
            assert!(s.slope_per_hour.abs() < 1e-12);
        }
        for w in rul.windows(2) {
            assert!(w[1].rul_hours <= w[0].rul_hours + 1e-9);
        }
    }

    #[test]
    fn test_linear_degradation_tracks_slope() {
        // Health falls 1.0 -> 0.05 over 100 hourly samples (~ -0.0096/hour)
        let health: Vec<f64> = (0..100)
            .map(|i| 1.0 - 0.95 * f64::from(i) / 99.0)
            .collect();
        let rul = estimate(&health);

        for w in rul.windows(2) {
            assert!(
                w[1].rul_hours <= w[0].rul_hours + 1e-9,
                "RUL recovered: {} -> {}",
                w[0].rul_hours,
                w[1].rul_hours
            );
        }
        for s in &rul {
            assert!(s.rul_hours >= 0.0 && s.rul_hours <= 600.0);
            assert!(s.slope_per_hour <= 0.0);
        }

        // Interior slope estimates approach the true degradation rate
        // (EWMA smoothing makes the early estimates shallower)
        let mid_slope = rul[60].slope_per_hour;
        assert!(
            (-0.012..=-0.006).contains(&mid_slope),
            "mid-series slope {mid_slope} out of band"
        );

        // By the end the forecast has drawn down to a short horizon
        let last = rul.last().expect("non-empty").rul_hours;
        assert!(last < 60.0, "final RUL {last} should be short");
    }

    #[test]
    fn test_flat_mid_health_assumes_minimum_rate() {
        // Healthy-but-degraded plateau: first forecast uses the minimum
        // meaningful rate, (0.8 - 0.05) / 0.002 = 375 hours
        let rul = estimate(&[0.8; 50]);
        assert!((rul[5].rul_hours - (375.0 - 5.0 * 0.5)).abs() < 1e-3);
    }

    #[test]
    fn test_upward_health_noise_is_clipped() {
        // A brief apparent recovery must not raise slope above zero or RUL
        let mut health: Vec<f64> = (0..80).map(|i| 1.0 - 0.005 * f64::from(i)).collect();
        health[40] += 0.2;
        let rul = estimate(&health);
        for s in &rul {
            assert!(s.slope_per_hour <= 0.0);
        }
        for w in rul.windows(2) {
            assert!(w[1].rul_hours <= w[0].rul_hours + 1e-9);
        }
    }

    #[test]
    fn test_single_sample_series() {
        let rul = estimate(&[0.6]);
        assert_eq!(rul.len(), 1);
        // Slope undefined -> minimum-rate estimate, clipped into [1, 600]
        assert!((rul[0].rul_hours - (0.55 / 0.002)).abs() < 1.0);
    }

    #[test]
    fn test_irregular_intervals_use_median() {
        // Mostly hourly with one large gap: median interval stays 1 hour
        let mut samples = hourly_series(&[1.0; 30]);
        for s in &mut samples[15..] {
            s.timestamp = s.timestamp + Duration::hours(500);
        }
        let config = RulConfig::default();
        let rul = RulEstimator::new(&config).estimate(&samples).expect("non-empty");
        // Decay per step is 0.5 * median interval = 0.5 h, regardless of the gap
        assert!((rul[10].rul_hours - (475.0 - 10.0 * 0.5)).abs() < 1e-3);
    }

    #[test]
    fn test_idempotence() {
        let health: Vec<f64> = (0..150).map(|i| 1.0 - 0.003 * f64::from(i)).collect();
        let a = estimate(&health);
        let b = estimate(&health);
        assert_eq!(a, b);
    }
}
