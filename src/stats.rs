//! Rolling-window statistics for the estimator stages
//!
//! Plain indexable-buffer implementations: window sizes shrink at sequence
//! boundaries, so none of these are expressible as fixed-size ring buffers.
//! All functions are pure and total — data sparsity degrades locally to
//! `None`, never to an error.

use statrs::statistics::{Data, OrderStatistics};

/// Exponentially-weighted moving average with adjusted (normalized) weights.
///
/// Weight of the sample `i` steps back is `(1 - alpha)^i`, renormalized over
/// the samples seen so far, with `alpha = 2 / (span + 1)`. Early outputs are
/// therefore unbiased rather than anchored to the first sample.
pub fn ewma_adjusted(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut out = Vec::with_capacity(values.len());
    let mut num = 0.0;
    let mut den = 0.0;
    for &v in values {
        num = v + decay * num;
        den = 1.0 + decay * den;
        out.push(num / den);
    }
    out
}

/// Exponentially-weighted moving average in recursive (unadjusted) form.
///
/// `y[0] = x[0]`, then `y[t] = (1 - alpha) * y[t-1] + alpha * x[t]` with
/// `alpha = 2 / (span + 1)`. Anchors to the first observation.
pub fn ewma_recursive(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);

    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let y = match prev {
            Some(p) => (1.0 - alpha) * p + alpha * v,
            None => v,
        };
        out.push(y);
        prev = Some(y);
    }
    out
}

/// Trailing rolling minimum and maximum over a window of up to `window`
/// samples, defined only once `min_periods` samples are available.
///
/// Position `i` covers `[i + 1 - window, i]` (clipped to the sequence start)
/// and yields `None` while fewer than `min_periods` samples are in view.
pub fn rolling_extrema(
    values: &[f64],
    window: usize,
    min_periods: usize,
) -> Vec<Option<(f64, f64)>> {
    let n = values.len();
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let lo = (i + 1).saturating_sub(window);
        let seg = &values[lo..=i];
        if seg.len() < min_periods {
            out.push(None);
            continue;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in seg {
            min = min.min(v);
            max = max.max(v);
        }
        out.push(Some((min, max)));
    }
    out
}

/// Median of a slice; `None` when empty. Even-length inputs average the two
/// middle order statistics.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(data.median())
}

/// Centered median filter with boundary shrinkage (minimum one valid point).
///
/// Position `i` takes the median over `[i - window/2, i + window/2]` clipped
/// to the sequence; shrunken edge windows are still filtered rather than
/// passed through.
pub fn median_filter_centered(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        // window always contains at least values[i], so the median exists
        let med = median(&values[lo..hi]).unwrap_or(values[i]);
        out.push(med);
    }
    out
}

/// Per-sample local trend via ordinary least squares over a centered window.
///
/// For each index the window spans up to `window` samples (`window/2` each
/// side, shrinking at the boundaries). Windows with fewer than
/// `max(6, window / 2)` points, or with a degenerate x-spread, yield `None`.
/// Slopes are in value-units per sample position.
pub fn rolling_ols_slope(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = window / 2;
    let min_points = 6.max(window / 2);
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let seg = &values[lo..hi];

        if seg.len() < min_points {
            out.push(None);
            continue;
        }

        let len = seg.len() as f64;
        let x_mean = (len - 1.0) / 2.0;
        let y_mean = seg.iter().sum::<f64>() / len;

        let mut cov = 0.0;
        let mut var = 0.0;
        for (j, &y) in seg.iter().enumerate() {
            let dx = j as f64 - x_mean;
            cov += dx * (y - y_mean);
            var += dx * dx;
        }

        if var == 0.0 {
            out.push(None);
        } else {
            out.push(Some(cov / var));
        }
    }
    out
}
