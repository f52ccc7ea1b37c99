use crate::report::KindArg;
use anyhow::Context;
use clap::ValueEnum;
use finbot_core::config::Settings;
use finbot_core::conformance::{check_analysis, check_recommendation, ConformanceReport};
use finbot_core::domain::report::Disclaimer;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, clap::Args)]
pub struct CheckArgs {
    /// Markdown report to check.
    pub path: PathBuf,

    #[arg(long, value_enum, default_value_t = KindArg::Analysis)]
    pub kind: KindArg,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub fn run_check(args: &CheckArgs, settings: &Settings) -> anyhow::Result<ExitCode> {
    let markdown = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let report = check_markdown(&markdown, args.kind, &settings.brand);
    tracing::info!(
        path = %args.path.display(),
        kind = %report.kind,
        violations_len = report.violations.len(),
        "checked report"
    );

    match args.format {
        OutputFormat::Text => print!("{}", text_summary(&report)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize conformance report")?
        ),
    }

    Ok(if report.is_conformant() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn check_markdown(markdown: &str, kind: KindArg, brand: &str) -> ConformanceReport {
    match kind {
        KindArg::Analysis => check_analysis(markdown, &Disclaimer::analysis(brand)),
        KindArg::Recommendation => check_recommendation(markdown, &Disclaimer::recommendation(brand)),
    }
}

fn text_summary(report: &ConformanceReport) -> String {
    let ticker = report.ticker.as_deref().unwrap_or("<unknown>");
    if report.is_conformant() {
        return format!("ok: {} report for {ticker} is conformant\n", report.kind);
    }
    let mut out = format!(
        "FAIL: {} report for {ticker} has {} violation(s)\n",
        report.kind,
        report.violations.len()
    );
    for v in &report.violations {
        out.push_str(&format!("  {v}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use finbot_core::domain::report::DEFAULT_BRAND;

    const BROKEN: &str = "# Complete Financial Analysis - AAPL\n\n**Analysis Date:** 10/16/2026 at 14:30\n**Current Price:** 229.87 USD\n\n## Fundamental Financial Analysis\n\n### 1. Company Overview\n\nText.\n";

    #[test]
    fn broken_report_lists_violations() {
        let report = check_markdown(BROKEN, KindArg::Analysis, DEFAULT_BRAND);
        assert!(!report.is_conformant());
        let text = text_summary(&report);
        assert!(text.starts_with("FAIL: analysis report for AAPL has"), "{text}");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "analysis");
        assert!(json["violations"].as_array().is_some_and(|v| !v.is_empty()));
    }

    #[test]
    fn wrong_kind_is_not_conformant() {
        let report = check_markdown(BROKEN, KindArg::Recommendation, DEFAULT_BRAND);
        assert!(report
            .violations
            .iter()
            .any(|v| v.rule == finbot_core::conformance::Rule::Title));
    }
}
