use analysis_core::Metric;
use anyhow::{Context, Result};
use filing_insights::DetectionOptions;
use std::env;

#[derive(Debug, Clone)]
pub struct InsightsConfig {
    pub deviation_threshold: f64,          // 2.0 standard deviations
    pub priority_metrics: Vec<Metric>,     // headline metrics by default
    pub json_logging: bool,                // RUST_LOG_FORMAT=json
}

impl InsightsConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            deviation_threshold: lookup("MARKETSTEP_DEVIATION_THRESHOLD")
                .unwrap_or_else(|| "2.0".to_string())
                .trim()
                .parse()
                .context("MARKETSTEP_DEVIATION_THRESHOLD must be a number")?,
            priority_metrics: match lookup("MARKETSTEP_PRIORITY_METRICS") {
                Some(list) => parse_metric_list(&list)
                    .context("MARKETSTEP_PRIORITY_METRICS must list metric names")?,
                None => Metric::PRIORITY.to_vec(),
            },
            json_logging: lookup("RUST_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };
        Ok(config)
    }

    pub fn detection_options(&self) -> DetectionOptions {
        DetectionOptions::default()
            .with_threshold(self.deviation_threshold)
            .with_metrics(self.priority_metrics.iter().copied())
    }
}

/// Comma-separated metric keys, e.g. "revenue,netIncome,free_cash_flow".
pub fn parse_metric_list(list: &str) -> Result<Vec<Metric>> {
    let metrics = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Metric>().map_err(anyhow::Error::from))
        .collect::<Result<Vec<_>>>()?;
    if metrics.is_empty() {
        anyhow::bail!("no metrics listed");
    }
    Ok(metrics)
}
