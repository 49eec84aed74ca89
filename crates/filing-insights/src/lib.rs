//! Filing Insights
//!
//! Statistical checks over metrics extracted from company filings: z-score
//! anomaly detection for the latest period and run-length trend
//! classification across reported periods.

pub mod anomaly;
pub mod trend;

use analysis_core::{AnalysisError, MetricSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use anomaly::{
    detect_anomalies, try_detect_anomalies, Anomaly, AnomalyReport, DetectionOptions,
    ExpectedRange, Severity,
};
pub use trend::{
    classify, identify_trends, sort_chronologically, try_identify_trends, Trend, TrendReport,
    TrendType,
};

/// Anomalies and trends for one filing, computed over the same history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsReport {
    /// Period of the sample tested for anomalies, if there was one
    pub period: Option<String>,
    pub anomalies: AnomalyReport,
    pub trends: TrendReport,
    pub generated_at: DateTime<Utc>,
}

pub struct FilingInsightsEngine {
    options: DetectionOptions,
}

impl FilingInsightsEngine {
    pub fn new(options: DetectionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    /// Test `current` against `historical` and classify trends across `historical`.
    pub fn analyze(&self, current: &MetricSample, historical: &[MetricSample]) -> InsightsReport {
        self.build_report(current, historical, historical)
    }

    /// Analyze a filing history with no designated current sample.
    ///
    /// The chronologically latest sample is tested for anomalies against the
    /// others; trends are classified across all samples.
    pub fn analyze_history(&self, samples: &[MetricSample]) -> InsightsReport {
        let latest = samples
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.chronological_cmp(b))
            .map(|(i, _)| i);

        let Some(latest) = latest else {
            tracing::warn!("No samples to analyze");
            return InsightsReport {
                period: None,
                anomalies: AnomalyReport::from(Err::<Vec<Anomaly>, _>(
                    AnalysisError::InsufficientData("no samples provided".to_string()),
                )),
                trends: identify_trends(samples),
                generated_at: Utc::now(),
            };
        };

        let history: Vec<MetricSample> = samples
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != latest)
            .map(|(_, s)| s.clone())
            .collect();

        self.build_report(&samples[latest], &history, samples)
    }

    fn build_report(
        &self,
        current: &MetricSample,
        history: &[MetricSample],
        trend_samples: &[MetricSample],
    ) -> InsightsReport {
        tracing::info!(
            "Analyzing {} against {} historical samples",
            current.period_label(),
            history.len()
        );

        let anomalies = detect_anomalies(current, history, &self.options);
        let trends = identify_trends(trend_samples);

        tracing::info!(
            "{}: {} anomalies, {} trends",
            current.period_label(),
            anomalies.anomalies.len(),
            trends.trends.len()
        );

        InsightsReport {
            period: Some(current.period_label()),
            anomalies,
            trends,
            generated_at: Utc::now(),
        }
    }
}

impl Default for FilingInsightsEngine {
    fn default() -> Self {
        Self::new(DetectionOptions::default())
    }
}
