//! Z-score anomaly detection for a filing's headline metrics.
//!
//! Each prioritized metric of the current sample is compared against the
//! same metric's values across the historical samples. Values further than
//! the configured number of standard deviations from the historical mean are
//! reported, most severe first.

use analysis_core::stats::{self, two_sided_tail_probability};
use analysis_core::{AnalysisError, Metric, MetricSample};
use serde::{Deserialize, Serialize};

/// Minimum historical samples (and defined values per metric) for detection.
pub const MIN_HISTORY: usize = 3;

/// Default z-score above which a value is flagged.
pub const DEFAULT_DEVIATION_THRESHOLD: f64 = 2.0;

/// Anomaly severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tier for an absolute z-score.
    pub fn from_deviation(deviation: f64) -> Self {
        if deviation > 3.0 {
            Severity::High
        } else if deviation > 2.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Historical mean plus/minus one standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedRange {
    pub min: f64,
    pub max: f64,
}

/// An outlier for one metric of the current sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub metric_name: Metric,
    pub value: f64,
    pub expected_range: ExpectedRange,
    /// Absolute z-score against the metric's own history
    pub deviation: f64,
    pub severity: Severity,
    /// P(|Z| >= deviation) under a standard normal
    pub tail_probability: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionOptions {
    pub deviation_threshold: f64,
    pub prioritize_metrics: Vec<Metric>,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            deviation_threshold: DEFAULT_DEVIATION_THRESHOLD,
            prioritize_metrics: Metric::PRIORITY.to_vec(),
        }
    }
}

impl DetectionOptions {
    pub fn with_threshold(mut self, deviation_threshold: f64) -> Self {
        self.deviation_threshold = deviation_threshold;
        self
    }

    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.prioritize_metrics = metrics.into_iter().collect();
        self
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        if !self.deviation_threshold.is_finite() || self.deviation_threshold < 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "deviation threshold must be a non-negative number, got {}",
                self.deviation_threshold
            )));
        }
        Ok(())
    }
}

/// Detection outcome. `error` is set when detection could not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Vec<Anomaly>, AnalysisError>> for AnomalyReport {
    fn from(result: Result<Vec<Anomaly>, AnalysisError>) -> Self {
        match result {
            Ok(anomalies) => Self { anomalies, error: None },
            Err(e) => Self {
                anomalies: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Detect anomalies in `current` relative to `historical`.
///
/// Never fails: insufficient history or a calculation problem yields an empty
/// list with `error` set.
pub fn detect_anomalies(
    current: &MetricSample,
    historical: &[MetricSample],
    options: &DetectionOptions,
) -> AnomalyReport {
    let result = try_detect_anomalies(current, historical, options);
    if let Err(e) = &result {
        tracing::warn!("Anomaly detection for {} skipped: {}", current.period_label(), e);
    }
    result.into()
}

/// Fallible form of [`detect_anomalies`].
pub fn try_detect_anomalies(
    current: &MetricSample,
    historical: &[MetricSample],
    options: &DetectionOptions,
) -> Result<Vec<Anomaly>, AnalysisError> {
    if historical.len() < MIN_HISTORY {
        return Err(AnalysisError::InsufficientData(format!(
            "not enough historical data: {} samples (need {})",
            historical.len(),
            MIN_HISTORY
        )));
    }
    options.validate()?;

    let mut anomalies = Vec::new();

    for &metric in &options.prioritize_metrics {
        let Some(value) = metric.value(current) else {
            continue;
        };

        let history: Vec<f64> = historical.iter().filter_map(|s| metric.value(s)).collect();
        if history.len() < MIN_HISTORY {
            tracing::debug!(
                "Skipping {}: {} historical values (need {})",
                metric,
                history.len(),
                MIN_HISTORY
            );
            continue;
        }

        let mean = stats::mean(&history);
        let std_dev = stats::population_std_dev(&history);
        if !mean.is_finite() || !std_dev.is_finite() {
            return Err(AnalysisError::CalculationError(format!(
                "non-finite statistics for {}",
                metric
            )));
        }

        let Some(deviation) = stats::abs_z_score(value, mean, std_dev) else {
            tracing::debug!("Skipping {}: zero variance in history", metric);
            continue;
        };
        if !deviation.is_finite() {
            return Err(AnalysisError::CalculationError(format!(
                "non-finite deviation for {}",
                metric
            )));
        }

        if deviation > options.deviation_threshold {
            let severity = Severity::from_deviation(deviation);
            anomalies.push(Anomaly {
                metric_name: metric,
                value,
                expected_range: ExpectedRange {
                    min: mean - std_dev,
                    max: mean + std_dev,
                },
                deviation,
                severity,
                tail_probability: two_sided_tail_probability(deviation),
                explanation: explain(metric, value, mean, deviation),
            });
        }
    }

    anomalies.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.deviation.total_cmp(&a.deviation))
    });

    tracing::debug!(
        "Detected {} anomalies for {} against {} historical samples",
        anomalies.len(),
        current.period_label(),
        historical.len()
    );

    Ok(anomalies)
}

/// Plain-language description of a flagged value.
fn explain(metric: Metric, value: f64, mean: f64, deviation: f64) -> String {
    let higher = value > mean;
    let direction = if higher { "higher" } else { "lower" };

    let headline = match stats::percent_change(mean, value) {
        Some(pct) => format!(
            "{} of {} is {:.1}% {} than the historical average of {}.",
            metric.label(),
            format_value(value),
            pct.abs(),
            direction,
            format_value(mean)
        ),
        None => format!(
            "{} of {} is {} than the historical average of {}.",
            metric.label(),
            format_value(value),
            direction,
            format_value(mean)
        ),
    };

    let commentary = match (metric, higher) {
        (Metric::GrossMargin, true) => {
            "Margin expansion of this size often points to better pricing power or lower input costs.".to_string()
        }
        (Metric::GrossMargin, false) => {
            "Margin compression of this size often points to rising input costs or pricing pressure.".to_string()
        }
        (Metric::Revenue, true) => {
            "Sales are well above trend; check whether demand grew or a one-time item such as an acquisition contributed.".to_string()
        }
        (Metric::Revenue, false) => {
            "Sales are well below trend, which may signal weakening demand or lost market share.".to_string()
        }
        (Metric::NetIncome | Metric::OperatingIncome, true) => {
            "Profitability is unusually strong; look for one-time gains before treating it as the new baseline.".to_string()
        }
        (Metric::NetIncome | Metric::OperatingIncome, false) => {
            "Profitability is unusually weak; look for impairments, restructuring or other one-time charges.".to_string()
        }
        (Metric::FreeCashFlow, true) => {
            "Cash generation jumped, possibly from lower capital spending or a working capital release.".to_string()
        }
        (Metric::FreeCashFlow, false) => {
            "Cash generation fell, possibly from heavier capital spending or a working capital build.".to_string()
        }
        _ => format!(
            "This is {:.1} standard deviations from its historical norm.",
            deviation
        ),
    };

    format!("{} {}", headline, commentary)
}

/// Compact figure for explanations: large amounts get a B/M/K suffix.
fn format_value(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four samples whose `metric` values have mean 100 and population std dev 10.
    fn history_of(metrics: &[Metric]) -> Vec<MetricSample> {
        [90.0, 110.0, 90.0, 110.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let quarter = ["Q1", "Q2", "Q3", "Q4"][i];
                metrics
                    .iter()
                    .fold(MetricSample::new(quarter, 2023), |s, &m| s.with_metric(m, v))
            })
            .collect()
    }

    fn current_with(values: &[(Metric, f64)]) -> MetricSample {
        values
            .iter()
            .fold(MetricSample::new("Q1", 2024), |s, &(m, v)| s.with_metric(m, v))
    }

    #[test]
    fn test_insufficient_history() {
        let current = current_with(&[(Metric::Revenue, 1000.0)]);
        let history = history_of(&[Metric::Revenue]);

        for len in 0..MIN_HISTORY {
            let report = detect_anomalies(&current, &history[..len], &DetectionOptions::default());
            assert!(report.anomalies.is_empty());
            let error = report.error.expect("error for short history");
            assert!(error.contains("not enough historical data"));
        }
    }

    #[test]
    fn test_zero_variance_is_not_anomalous() {
        let history: Vec<MetricSample> = ["Q1", "Q2", "Q3"]
            .iter()
            .map(|q| MetricSample::new(*q, 2023).with_metric(Metric::Revenue, 100.0))
            .collect();
        let current = current_with(&[(Metric::Revenue, 110.0)]);

        let report = detect_anomalies(&current, &history, &DetectionOptions::default());
        assert!(report.error.is_none());
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_constant_fractional_history_is_not_anomalous() {
        let history: Vec<MetricSample> = ["Q1", "Q2", "Q3"]
            .iter()
            .map(|q| MetricSample::new(*q, 2023).with_metric(Metric::Revenue, 12_345_679.3))
            .collect();
        let current = current_with(&[(Metric::Revenue, 12_345_679.3 * 1.10)]);

        let report = detect_anomalies(&current, &history, &DetectionOptions::default());
        assert!(report.error.is_none());
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_overflowing_history_reports_error() {
        let history: Vec<MetricSample> = ["Q1", "Q2", "Q3"]
            .iter()
            .map(|q| MetricSample::new(*q, 2023).with_metric(Metric::Revenue, 1e308))
            .collect();
        let current = current_with(&[(Metric::Revenue, 1e308)]);

        let report = detect_anomalies(&current, &history, &DetectionOptions::default());
        assert!(report.anomalies.is_empty());
        let error = report.error.expect("overflow is reported");
        assert!(error.contains("non-finite"), "{}", error);

        let result = try_detect_anomalies(&current, &history, &DetectionOptions::default());
        assert!(matches!(result, Err(AnalysisError::CalculationError(_))));
    }

    #[test]
    fn test_threshold_is_strict() {
        let history = history_of(&[Metric::Revenue]);
        let options = DetectionOptions::default();

        let at_threshold = current_with(&[(Metric::Revenue, 120.0)]);
        assert!(try_detect_anomalies(&at_threshold, &history, &options)
            .unwrap()
            .is_empty());

        let above = current_with(&[(Metric::Revenue, 120.01)]);
        let anomalies = try_detect_anomalies(&above, &history, &options).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Low);
        assert_eq!(anomalies[0].metric_name, Metric::Revenue);
        assert_eq!(anomalies[0].expected_range, ExpectedRange { min: 90.0, max: 110.0 });
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::from_deviation(2.1), Severity::Low);
        assert_eq!(Severity::from_deviation(2.5), Severity::Low);
        assert_eq!(Severity::from_deviation(2.6), Severity::Medium);
        assert_eq!(Severity::from_deviation(3.0), Severity::Medium);
        assert_eq!(Severity::from_deviation(3.1), Severity::High);

        let history = history_of(&[Metric::Revenue]);
        let options = DetectionOptions::default();
        for (value, expected) in [(121.0, Severity::Low), (126.0, Severity::Medium), (131.0, Severity::High)] {
            let current = current_with(&[(Metric::Revenue, value)]);
            let anomalies = try_detect_anomalies(&current, &history, &options).unwrap();
            assert_eq!(anomalies[0].severity, expected, "value {}", value);
        }
    }

    #[test]
    fn test_sorted_by_severity_then_deviation() {
        let metrics = [
            Metric::Revenue,
            Metric::NetIncome,
            Metric::OperatingIncome,
            Metric::EarningsPerShare,
        ];
        let history = history_of(&metrics);
        let current = current_with(&[
            (Metric::Revenue, 122.0),          // z = 2.2, low
            (Metric::NetIncome, 135.0),        // z = 3.5, high
            (Metric::OperatingIncome, 127.0),  // z = 2.7, medium
            (Metric::EarningsPerShare, 140.0), // z = 4.0, high
        ]);

        let anomalies = try_detect_anomalies(&current, &history, &DetectionOptions::default()).unwrap();
        let order: Vec<(Metric, Severity)> =
            anomalies.iter().map(|a| (a.metric_name, a.severity)).collect();
        assert_eq!(
            order,
            vec![
                (Metric::EarningsPerShare, Severity::High),
                (Metric::NetIncome, Severity::High),
                (Metric::OperatingIncome, Severity::Medium),
                (Metric::Revenue, Severity::Low),
            ]
        );
        assert!((anomalies[0].deviation - 4.0).abs() < 1e-9);
        assert!((anomalies[1].deviation - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_only_prioritized_metrics_are_examined() {
        let history = history_of(&[Metric::Cash, Metric::Revenue]);
        let current = current_with(&[(Metric::Cash, 500.0), (Metric::Revenue, 500.0)]);

        let default = try_detect_anomalies(&current, &history, &DetectionOptions::default()).unwrap();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].metric_name, Metric::Revenue);

        let cash_only = DetectionOptions::default().with_metrics([Metric::Cash]);
        let anomalies = try_detect_anomalies(&current, &history, &cash_only).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].metric_name, Metric::Cash);
        assert!(anomalies[0].explanation.contains("standard deviations"));
    }

    #[test]
    fn test_metric_with_sparse_history_is_skipped() {
        let mut history = history_of(&[Metric::Revenue]);
        history[0] = history[0].clone().with_metric(Metric::NetIncome, 10.0);
        history[1] = history[1].clone().with_metric(Metric::NetIncome, 12.0);
        let current = current_with(&[(Metric::Revenue, 100.0), (Metric::NetIncome, 1000.0)]);

        let report = detect_anomalies(&current, &history, &DetectionOptions::default());
        assert!(report.error.is_none());
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_custom_threshold() {
        let history = history_of(&[Metric::Revenue]);
        let current = current_with(&[(Metric::Revenue, 115.0)]);

        let loose = DetectionOptions::default().with_threshold(1.0);
        let anomalies = try_detect_anomalies(&current, &history, &loose).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Low);

        let invalid = DetectionOptions::default().with_threshold(f64::NAN);
        let report = detect_anomalies(&current, &history, &invalid);
        assert!(report.anomalies.is_empty());
        assert!(report.error.is_some());
    }

    #[test]
    fn test_explanations() {
        let history = history_of(&[Metric::GrossMargin, Metric::FreeCashFlow]);
        let current = current_with(&[(Metric::GrossMargin, 150.0), (Metric::FreeCashFlow, 50.0)]);

        let anomalies = try_detect_anomalies(&current, &history, &DetectionOptions::default()).unwrap();
        let margin = anomalies.iter().find(|a| a.metric_name == Metric::GrossMargin).unwrap();
        assert!(margin.explanation.starts_with("Gross Margin of 150.00 is 50.0% higher"));
        assert!(margin.explanation.contains("pricing power"));

        let fcf = anomalies.iter().find(|a| a.metric_name == Metric::FreeCashFlow).unwrap();
        assert!(fcf.explanation.contains("50.0% lower"));
        assert!(fcf.explanation.contains("Cash generation fell"));
        assert!(fcf.tail_probability > 0.0 && fcf.tail_probability < 0.05);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(2_500_000_000.0), "2.50B");
        assert_eq!(format_value(-1_250_000.0), "-1.25M");
        assert_eq!(format_value(4_200.0), "4.20K");
        assert_eq!(format_value(3.14159), "3.14");
    }

    #[test]
    fn test_report_serialization() {
        let history = history_of(&[Metric::Revenue]);
        let current = current_with(&[(Metric::Revenue, 140.0)]);
        let report = detect_anomalies(&current, &history, &DetectionOptions::default());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("error").is_none());
        let anomaly = &json["anomalies"][0];
        assert_eq!(anomaly["metricName"], "revenue");
        assert_eq!(anomaly["severity"], "high");
        assert_eq!(anomaly["expectedRange"]["min"], 90.0);
    }
}
