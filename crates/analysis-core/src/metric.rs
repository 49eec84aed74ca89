use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, MetricSample};

/// Numeric field of a [`MetricSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Revenue,
    RevenueGrowth,
    GrossProfit,
    GrossMargin,
    OperatingIncome,
    NetIncome,
    EarningsPerShare,
    TotalAssets,
    TotalLiabilities,
    TotalEquity,
    Cash,
    Debt,
    OperatingCashFlow,
    FreeCashFlow,
    RevenueGuidanceLow,
    RevenueGuidanceHigh,
    EpsGuidanceLow,
    EpsGuidanceHigh,
}

impl Metric {
    pub const ALL: [Metric; 18] = [
        Metric::Revenue,
        Metric::RevenueGrowth,
        Metric::GrossProfit,
        Metric::GrossMargin,
        Metric::OperatingIncome,
        Metric::NetIncome,
        Metric::EarningsPerShare,
        Metric::TotalAssets,
        Metric::TotalLiabilities,
        Metric::TotalEquity,
        Metric::Cash,
        Metric::Debt,
        Metric::OperatingCashFlow,
        Metric::FreeCashFlow,
        Metric::RevenueGuidanceLow,
        Metric::RevenueGuidanceHigh,
        Metric::EpsGuidanceLow,
        Metric::EpsGuidanceHigh,
    ];

    /// Headline metrics examined by default for anomalies and trends.
    pub const PRIORITY: [Metric; 6] = [
        Metric::Revenue,
        Metric::GrossMargin,
        Metric::OperatingIncome,
        Metric::NetIncome,
        Metric::EarningsPerShare,
        Metric::FreeCashFlow,
    ];

    /// Wire key, matching the sample's JSON field name.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::RevenueGrowth => "revenueGrowth",
            Metric::GrossProfit => "grossProfit",
            Metric::GrossMargin => "grossMargin",
            Metric::OperatingIncome => "operatingIncome",
            Metric::NetIncome => "netIncome",
            Metric::EarningsPerShare => "earningsPerShare",
            Metric::TotalAssets => "totalAssets",
            Metric::TotalLiabilities => "totalLiabilities",
            Metric::TotalEquity => "totalEquity",
            Metric::Cash => "cash",
            Metric::Debt => "debt",
            Metric::OperatingCashFlow => "operatingCashFlow",
            Metric::FreeCashFlow => "freeCashFlow",
            Metric::RevenueGuidanceLow => "revenueGuidanceLow",
            Metric::RevenueGuidanceHigh => "revenueGuidanceHigh",
            Metric::EpsGuidanceLow => "epsGuidanceLow",
            Metric::EpsGuidanceHigh => "epsGuidanceHigh",
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Revenue => "Revenue",
            Metric::RevenueGrowth => "Revenue Growth",
            Metric::GrossProfit => "Gross Profit",
            Metric::GrossMargin => "Gross Margin",
            Metric::OperatingIncome => "Operating Income",
            Metric::NetIncome => "Net Income",
            Metric::EarningsPerShare => "Earnings Per Share",
            Metric::TotalAssets => "Total Assets",
            Metric::TotalLiabilities => "Total Liabilities",
            Metric::TotalEquity => "Total Equity",
            Metric::Cash => "Cash",
            Metric::Debt => "Debt",
            Metric::OperatingCashFlow => "Operating Cash Flow",
            Metric::FreeCashFlow => "Free Cash Flow",
            Metric::RevenueGuidanceLow => "Revenue Guidance (Low)",
            Metric::RevenueGuidanceHigh => "Revenue Guidance (High)",
            Metric::EpsGuidanceLow => "EPS Guidance (Low)",
            Metric::EpsGuidanceHigh => "EPS Guidance (High)",
        }
    }

    /// Read this metric from a sample. Non-finite values count as missing.
    pub fn value(&self, sample: &MetricSample) -> Option<f64> {
        let value = *self.slot(sample);
        value.filter(|v| v.is_finite())
    }

    fn slot<'a>(&self, sample: &'a MetricSample) -> &'a Option<f64> {
        match self {
            Metric::Revenue => &sample.revenue,
            Metric::RevenueGrowth => &sample.revenue_growth,
            Metric::GrossProfit => &sample.gross_profit,
            Metric::GrossMargin => &sample.gross_margin,
            Metric::OperatingIncome => &sample.operating_income,
            Metric::NetIncome => &sample.net_income,
            Metric::EarningsPerShare => &sample.earnings_per_share,
            Metric::TotalAssets => &sample.total_assets,
            Metric::TotalLiabilities => &sample.total_liabilities,
            Metric::TotalEquity => &sample.total_equity,
            Metric::Cash => &sample.cash,
            Metric::Debt => &sample.debt,
            Metric::OperatingCashFlow => &sample.operating_cash_flow,
            Metric::FreeCashFlow => &sample.free_cash_flow,
            Metric::RevenueGuidanceLow => &sample.revenue_guidance_low,
            Metric::RevenueGuidanceHigh => &sample.revenue_guidance_high,
            Metric::EpsGuidanceLow => &sample.eps_guidance_low,
            Metric::EpsGuidanceHigh => &sample.eps_guidance_high,
        }
    }

    pub(crate) fn slot_mut<'a>(&self, sample: &'a mut MetricSample) -> &'a mut Option<f64> {
        match self {
            Metric::Revenue => &mut sample.revenue,
            Metric::RevenueGrowth => &mut sample.revenue_growth,
            Metric::GrossProfit => &mut sample.gross_profit,
            Metric::GrossMargin => &mut sample.gross_margin,
            Metric::OperatingIncome => &mut sample.operating_income,
            Metric::NetIncome => &mut sample.net_income,
            Metric::EarningsPerShare => &mut sample.earnings_per_share,
            Metric::TotalAssets => &mut sample.total_assets,
            Metric::TotalLiabilities => &mut sample.total_liabilities,
            Metric::TotalEquity => &mut sample.total_equity,
            Metric::Cash => &mut sample.cash,
            Metric::Debt => &mut sample.debt,
            Metric::OperatingCashFlow => &mut sample.operating_cash_flow,
            Metric::FreeCashFlow => &mut sample.free_cash_flow,
            Metric::RevenueGuidanceLow => &mut sample.revenue_guidance_low,
            Metric::RevenueGuidanceHigh => &mut sample.revenue_guidance_high,
            Metric::EpsGuidanceLow => &mut sample.eps_guidance_low,
            Metric::EpsGuidanceHigh => &mut sample.eps_guidance_high,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Accepts the camelCase wire key or its snake_case spelling.
impl FromStr for Metric {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.trim().chars().filter(|c| *c != '_').collect();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.key().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| AnalysisError::InvalidData(format!("unknown metric '{}'", s.trim())))
    }
}
