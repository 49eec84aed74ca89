//! Multi-period trend classification.
//!
//! Samples are put in fiscal order and each tracked metric's period-over-period
//! percent changes are scanned for directional runs. A metric with no run of
//! two or more same-direction moves is either stable or, when its changes swing
//! widely, volatile.

use analysis_core::stats;
use analysis_core::{AnalysisError, Metric, MetricSample};
use serde::{Deserialize, Serialize};

/// Minimum samples (and defined values per metric) for trend identification.
pub const MIN_PERIODS: usize = 4;

/// Period-over-period moves within this band (in percent) count as flat.
pub const FLAT_BAND_PCT: f64 = 1.0;

/// Std dev of percent changes above which a directionless metric is volatile.
pub const VOLATILITY_THRESHOLD_PCT: f64 = 10.0;

/// Consecutive same-direction moves needed to call a direction.
const MIN_RUN: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendType {
    Increasing,
    Decreasing,
    Stable,
    Volatile,
}

/// Trajectory of one metric across the historical samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub metric: Metric,
    pub trend_type: TrendType,
    /// Run length for increasing/decreasing, scaled volatility for volatile
    pub strength: f64,
    pub recent_value: f64,
    /// `None` when the earliest value is zero
    pub percent_change_from_earliest: Option<f64>,
    /// "{fiscal period} {fiscal year}" for each value, oldest first
    pub periods: Vec<String>,
}

/// Trend outcome. `error` is set when identification could not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub trends: Vec<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Vec<Trend>, AnalysisError>> for TrendReport {
    fn from(result: Result<Vec<Trend>, AnalysisError>) -> Self {
        match result {
            Ok(trends) => Self { trends, error: None },
            Err(e) => Self {
                trends: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Samples ordered by fiscal year, then fiscal period. Equal keys keep input order.
pub fn sort_chronologically(samples: &[MetricSample]) -> Vec<&MetricSample> {
    let mut sorted: Vec<&MetricSample> = samples.iter().collect();
    sorted.sort_by(|a, b| a.chronological_cmp(b));
    sorted
}

/// Identify trends in the headline metrics across `historical`.
///
/// Never fails: fewer than [`MIN_PERIODS`] samples yields an empty list with
/// `error` set.
pub fn identify_trends(historical: &[MetricSample]) -> TrendReport {
    let result = try_identify_trends(historical);
    if let Err(e) = &result {
        tracing::warn!("Trend identification skipped: {}", e);
    }
    result.into()
}

/// Fallible form of [`identify_trends`].
pub fn try_identify_trends(historical: &[MetricSample]) -> Result<Vec<Trend>, AnalysisError> {
    if historical.len() < MIN_PERIODS {
        return Err(AnalysisError::InsufficientData(format!(
            "at least {} historical samples are required for trend analysis, got {}",
            MIN_PERIODS,
            historical.len()
        )));
    }

    let sorted = sort_chronologically(historical);
    let mut trends = Vec::new();

    for metric in Metric::PRIORITY {
        let (periods, values): (Vec<String>, Vec<f64>) = sorted
            .iter()
            .filter_map(|s| metric.value(s).map(|v| (s.period_label(), v)))
            .unzip();

        if values.len() < MIN_PERIODS {
            tracing::debug!(
                "Skipping trend for {}: {} values (need {})",
                metric,
                values.len(),
                MIN_PERIODS
            );
            continue;
        }

        let (trend_type, strength) = classify(&values);
        if trend_type == TrendType::Stable {
            continue;
        }

        let first = values[0];
        let last = values[values.len() - 1];
        trends.push(Trend {
            metric,
            trend_type,
            strength,
            recent_value: last,
            percent_change_from_earliest: stats::percent_change(first, last),
            periods,
        });
    }

    Ok(trends)
}

/// Classify a chronological value sequence, returning the trend and its strength.
///
/// Directional runs are tracked left to right and the last run reaching
/// [`MIN_RUN`] decides the direction, even if an earlier run was longer.
/// Changes from a zero value are undefined and left out.
pub fn classify(values: &[f64]) -> (TrendType, f64) {
    let changes: Vec<f64> = values
        .windows(2)
        .filter_map(|w| stats::percent_change(w[0], w[1]))
        .collect();

    let mut trend_type = TrendType::Stable;
    let mut strength = 0.0;
    let mut increases = 0u32;
    let mut decreases = 0u32;

    for &change in &changes {
        if change > FLAT_BAND_PCT {
            increases += 1;
            decreases = 0;
        } else if change < -FLAT_BAND_PCT {
            decreases += 1;
            increases = 0;
        } else {
            increases = 0;
            decreases = 0;
        }

        if increases >= MIN_RUN {
            trend_type = TrendType::Increasing;
            strength = increases as f64;
        } else if decreases >= MIN_RUN {
            trend_type = TrendType::Decreasing;
            strength = decreases as f64;
        }
    }

    if trend_type == TrendType::Stable {
        let volatility = stats::population_std_dev(&changes);
        if volatility > VOLATILITY_THRESHOLD_PCT {
            return (
                TrendType::Volatile,
                stats::round_to(volatility / VOLATILITY_THRESHOLD_PCT, 2),
            );
        }
    }

    (trend_type, strength)
}
