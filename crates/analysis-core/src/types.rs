use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Metric;

/// Fiscal period of a report
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FiscalPeriod {
    Q1,
    Q2,
    Q3,
    Q4,
    FullYear,
    /// Any label the extractor produced that is not a quarter or full year
    Other(String),
}

impl FiscalPeriod {
    /// Position within a fiscal year. Unrecognized labels sort first.
    pub fn ordinal(&self) -> u8 {
        match self {
            FiscalPeriod::Q1 => 1,
            FiscalPeriod::Q2 => 2,
            FiscalPeriod::Q3 => 3,
            FiscalPeriod::Q4 => 4,
            FiscalPeriod::FullYear => 5,
            FiscalPeriod::Other(_) => 0,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FiscalPeriod::Q1 => "Q1",
            FiscalPeriod::Q2 => "Q2",
            FiscalPeriod::Q3 => "Q3",
            FiscalPeriod::Q4 => "Q4",
            FiscalPeriod::FullYear => "Full Year",
            FiscalPeriod::Other(label) => label,
        }
    }
}

impl From<String> for FiscalPeriod {
    fn from(label: String) -> Self {
        let key = label.trim().to_ascii_uppercase();
        match key.as_str() {
            "Q1" => FiscalPeriod::Q1,
            "Q2" => FiscalPeriod::Q2,
            "Q3" => FiscalPeriod::Q3,
            "Q4" => FiscalPeriod::Q4,
            "FULL YEAR" | "FY" => FiscalPeriod::FullYear,
            _ => FiscalPeriod::Other(label),
        }
    }
}

impl From<&str> for FiscalPeriod {
    fn from(label: &str) -> Self {
        FiscalPeriod::from(label.to_string())
    }
}

impl From<FiscalPeriod> for String {
    fn from(period: FiscalPeriod) -> Self {
        match period {
            FiscalPeriod::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Financial metrics extracted from a single filing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    /// Filing form label, e.g. "10-Q"
    #[serde(default)]
    pub report_type: String,
    pub fiscal_period: FiscalPeriod,
    #[serde(deserialize_with = "deserialize_fiscal_year")]
    pub fiscal_year: i32,

    pub revenue: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub gross_profit: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub earnings_per_share: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub total_equity: Option<f64>,
    pub cash: Option<f64>,
    pub debt: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub revenue_guidance_low: Option<f64>,
    pub revenue_guidance_high: Option<f64>,
    pub eps_guidance_low: Option<f64>,
    pub eps_guidance_high: Option<f64>,

    #[serde(default)]
    pub key_risks: Vec<String>,
    #[serde(default)]
    pub significant_events: Vec<String>,

    pub source: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Extraction confidence, 0.0 to 1.0
    pub confidence: Option<f64>,
}

impl MetricSample {
    /// Empty sample for a period; metrics are attached with [`MetricSample::with_metric`].
    pub fn new(fiscal_period: impl Into<FiscalPeriod>, fiscal_year: i32) -> Self {
        Self {
            report_type: String::new(),
            fiscal_period: fiscal_period.into(),
            fiscal_year,
            revenue: None,
            revenue_growth: None,
            gross_profit: None,
            gross_margin: None,
            operating_income: None,
            net_income: None,
            earnings_per_share: None,
            total_assets: None,
            total_liabilities: None,
            total_equity: None,
            cash: None,
            debt: None,
            operating_cash_flow: None,
            free_cash_flow: None,
            revenue_guidance_low: None,
            revenue_guidance_high: None,
            eps_guidance_low: None,
            eps_guidance_high: None,
            key_risks: Vec::new(),
            significant_events: Vec::new(),
            source: None,
            processed_at: None,
            confidence: None,
        }
    }

    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        *metric.slot_mut(&mut self) = Some(value);
        self
    }

    pub fn with_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.report_type = report_type.into();
        self
    }

    /// "{fiscal period} {fiscal year}", e.g. "Q3 2024"
    pub fn period_label(&self) -> String {
        format!("{} {}", self.fiscal_period, self.fiscal_year)
    }

    /// Chronological ordering: fiscal year, then period within the year.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.fiscal_year
            .cmp(&other.fiscal_year)
            .then_with(|| self.fiscal_period.ordinal().cmp(&other.fiscal_period.ordinal()))
    }
}

/// Extractors emit the fiscal year either as a number or as a string.
fn deserialize_fiscal_year<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum YearRepr {
        Number(i32),
        Text(String),
    }

    match YearRepr::deserialize(deserializer)? {
        YearRepr::Number(year) => Ok(year),
        YearRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid fiscal year '{}'", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fiscal_period_parsing() {
        assert_eq!(FiscalPeriod::from("q3"), FiscalPeriod::Q3);
        assert_eq!(FiscalPeriod::from("Full Year"), FiscalPeriod::FullYear);
        assert_eq!(FiscalPeriod::from("FY"), FiscalPeriod::FullYear);
        assert_eq!(FiscalPeriod::from("H1"), FiscalPeriod::Other("H1".to_string()));
        assert_eq!(FiscalPeriod::from("H1").ordinal(), 0);
        assert_eq!(FiscalPeriod::FullYear.ordinal(), 5);
    }

    #[test]
    fn test_deserialize_sample() {
        let sample: MetricSample = serde_json::from_value(json!({
            "reportType": "10-Q",
            "fiscalPeriod": "Q2",
            "fiscalYear": "2023",
            "revenue": 1500.0,
            "grossMargin": 42.5,
            "keyRisks": ["Supply chain"],
            "source": "sec-edgar",
            "processedAt": "2024-01-15T12:00:00Z",
            "confidence": 0.9
        }))
        .unwrap();

        assert_eq!(sample.fiscal_period, FiscalPeriod::Q2);
        assert_eq!(sample.fiscal_year, 2023);
        assert_eq!(sample.revenue, Some(1500.0));
        assert_eq!(sample.net_income, None);
        assert_eq!(sample.key_risks, vec!["Supply chain".to_string()]);
        assert!(sample.significant_events.is_empty());
        assert_eq!(sample.period_label(), "Q2 2023");
    }

    #[test]
    fn test_numeric_fiscal_year_and_bad_year() {
        let sample: MetricSample =
            serde_json::from_value(json!({ "fiscalPeriod": "Full Year", "fiscalYear": 2022 })).unwrap();
        assert_eq!(sample.fiscal_year, 2022);
        assert_eq!(sample.period_label(), "Full Year 2022");

        let bad = serde_json::from_value::<MetricSample>(json!({
            "fiscalPeriod": "Q1",
            "fiscalYear": "next year"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_serializes_period_label() {
        let sample = MetricSample::new("Full Year", 2022).with_metric(Metric::Revenue, 10.0);
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["fiscalPeriod"], json!("Full Year"));
        assert_eq!(value["revenue"], json!(10.0));
    }

    #[test]
    fn test_chronological_cmp() {
        let fy22 = MetricSample::new("Full Year", 2022);
        let q1 = MetricSample::new("Q1", 2023);
        let q2 = MetricSample::new("Q2", 2023);
        let other = MetricSample::new("H1", 2023);

        assert_eq!(fy22.chronological_cmp(&q1), Ordering::Less);
        assert_eq!(q2.chronological_cmp(&q1), Ordering::Greater);
        assert_eq!(other.chronological_cmp(&q1), Ordering::Less);
    }
}
