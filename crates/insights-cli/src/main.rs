//! marketstep-insights: run anomaly detection and trend identification over
//! metric samples extracted from company filings.
//!
//! Reads a JSON document and prints an insights report as JSON on stdout.
//! The input is either `{ "current": {...}, "historical": [...] }` or a bare
//! array of samples, in which case the latest sample is tested against the rest.
//!
//! Usage:
//!   marketstep-insights --input filings.json
//!   marketstep-insights --input - --threshold 2.5 --pretty < filings.json
//!   marketstep-insights --input filings.json --metrics revenue,netIncome

mod config;

use std::io::Read;

use analysis_core::MetricSample;
use anyhow::{Context, Result};
use filing_insights::{FilingInsightsEngine, InsightsReport};
use serde::Deserialize;

use config::{parse_metric_list, InsightsConfig};

/// Accepted input documents
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InsightsInput {
    Split {
        current: MetricSample,
        historical: Vec<MetricSample>,
    },
    History(Vec<MetricSample>),
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    input: Option<String>,
    threshold: Option<f64>,
    metrics: Option<String>,
    pretty: bool,
}

impl CliArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .filter(|v| !v.starts_with("--"))
                .cloned()
        };

        let threshold = match value_of("--threshold") {
            Some(v) => Some(
                v.parse()
                    .with_context(|| format!("--threshold expects a number, got '{}'", v))?,
            ),
            None => None,
        };

        Ok(Self {
            input: value_of("--input"),
            threshold,
            metrics: value_of("--metrics"),
            pretty: args.iter().any(|a| a == "--pretty"),
        })
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut config = InsightsConfig::from_env()?;
    init_tracing(config.json_logging);

    let args: Vec<String> = std::env::args().collect();
    let cli = CliArgs::parse(&args)?;

    let Some(input_path) = cli.input.as_deref() else {
        eprintln!("Usage:");
        eprintln!("  marketstep-insights --input PATH        JSON file of metric samples ('-' for stdin)");
        eprintln!("");
        eprintln!("Options:");
        eprintln!("  --threshold X      Deviation threshold in std devs (default: {})", config.deviation_threshold);
        eprintln!("  --metrics a,b,c    Metrics to check for anomalies (default: headline metrics)");
        eprintln!("  --pretty           Pretty-print the report");
        std::process::exit(1);
    };

    if let Some(threshold) = cli.threshold {
        config.deviation_threshold = threshold;
    }
    if let Some(list) = cli.metrics.as_deref() {
        config.priority_metrics = parse_metric_list(list).context("invalid --metrics")?;
    }

    let raw = read_input(input_path)?;
    let input: InsightsInput = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid metric sample document", input_path))?;

    let engine = FilingInsightsEngine::new(config.detection_options());
    let report = run(&engine, &input);

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output);

    Ok(())
}

fn init_tracing(json_logging: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "insights_cli=info,filing_insights=info".into())
    };
    // Logs go to stderr; stdout carries the report.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read samples from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))
    }
}

fn run(engine: &FilingInsightsEngine, input: &InsightsInput) -> InsightsReport {
    match input {
        InsightsInput::Split { current, historical } => {
            tracing::info!("Loaded current sample and {} historical samples", historical.len());
            engine.analyze(current, historical)
        }
        InsightsInput::History(samples) => {
            tracing::info!("Loaded {} samples", samples.len());
            engine.analyze_history(samples)
        }
    }
}
