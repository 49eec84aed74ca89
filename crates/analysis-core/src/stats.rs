//! Descriptive statistics shared by the filing analyzers.
//!
//! Spreads are population statistics (divide by N), not sample statistics.

use statrs::distribution::{ContinuousCDF, Normal};

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute population standard deviation.
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Absolute z-score of `value` against a distribution with the given mean and std dev.
/// Returns `None` when the spread is within rounding noise at the data's scale.
pub fn abs_z_score(value: f64, mean: f64, std_dev: f64) -> Option<f64> {
    if std_dev <= f64::EPSILON * mean.abs().max(1.0) * 4.0 {
        return None;
    }
    Some((value - mean).abs() / std_dev)
}

/// Percent change from `from` to `to`.
/// Returns `None` when `from` is zero.
pub fn percent_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 {
        return None;
    }
    Some((to - from) / from * 100.0)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Two-sided tail probability of a standard normal: P(|Z| >= z).
pub fn two_sided_tail_probability(z: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => (2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0),
        Err(_) => 0.0,
    }
}
