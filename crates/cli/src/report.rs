use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use clap::ValueEnum;
use finbot_core::config::Settings;
use finbot_core::conformance::{check_analysis, check_recommendation, ReportKind};
use finbot_core::domain::contract::ReportInput;
use finbot_core::domain::report::Disclaimer;
use finbot_core::render::{metric_rows, render_analysis, render_recommendation};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KindArg {
    #[default]
    Analysis,
    Recommendation,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Analysis => ReportKind::Analysis,
            KindArg::Recommendation => ReportKind::Recommendation,
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct RenderArgs {
    /// Report input JSON (snapshot, metrics and narratives).
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = KindArg::Analysis)]
    pub kind: KindArg,

    /// Write the markdown here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Overrides `analyzed_at` from the input (RFC 3339, `YYYY-MM-DD HH:MM`, ...).
    #[arg(long)]
    pub analyzed_at: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct MetricsArgs {
    #[arg(long)]
    pub input: PathBuf,
}

pub fn run_render(args: &RenderArgs, settings: &Settings) -> anyhow::Result<()> {
    let mut input = read_input(&args.input)?;
    if let Some(at) = &args.analyzed_at {
        input.analyzed_at = Some(at.clone());
    }

    let offset = settings.display_offset()?;
    let markdown = render_input(input, args.kind.into(), &settings.brand, Utc::now(), offset)?;

    match &args.out {
        Some(path) => std::fs::write(path, &markdown)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{markdown}"),
    }
    Ok(())
}

pub fn run_metrics(args: &MetricsArgs, settings: &Settings) -> anyhow::Result<()> {
    let input = read_input(&args.input)?;
    let snapshot = input.validate_and_into_snapshot(Utc::now(), settings.display_offset()?)?;
    print!("{}", metrics_table(&metric_rows(&snapshot)));
    Ok(())
}

/// Validates, assembles and renders one report, then checks the output against the
/// report format before handing it back.
pub fn render_input(
    input: ReportInput,
    kind: ReportKind,
    brand: &str,
    now_utc: DateTime<Utc>,
    offset: FixedOffset,
) -> anyhow::Result<String> {
    match kind {
        ReportKind::Analysis => {
            let report = input.validate_and_into_analysis(now_utc, offset, Disclaimer::analysis(brand))?;
            let markdown = render_analysis(&report);
            check_analysis(&markdown, report.disclaimer()).into_result()?;
            tracing::info!(
                ticker = %report.snapshot().ticker,
                report_id = %report.report_id(),
                metrics_len = report.snapshot().metrics.len(),
                "rendered analysis report"
            );
            Ok(markdown)
        }
        ReportKind::Recommendation => {
            let report = input.validate_and_into_recommendation(
                now_utc,
                offset,
                Disclaimer::recommendation(brand),
            )?;
            let markdown = render_recommendation(&report);
            check_recommendation(&markdown, report.disclaimer()).into_result()?;
            tracing::info!(
                ticker = %report.ticker(),
                report_id = %report.report_id(),
                rating = %report.rating(),
                "rendered recommendation report"
            );
            Ok(markdown)
        }
    }
}

fn read_input(path: &Path) -> anyhow::Result<ReportInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    ReportInput::from_json(&text).with_context(|| format!("invalid report input {}", path.display()))
}

fn metrics_table(rows: &[(&str, String)]) -> String {
    if rows.is_empty() {
        return "no metrics\n".to_string();
    }
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (label, value) in rows {
        out.push_str(&format!("{label:<width$}  {value}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use finbot_core::domain::report::DEFAULT_BRAND;
    use serde_json::json;

    fn input() -> ReportInput {
        let sections = |titles: &[&str]| {
            titles
                .iter()
                .map(|t| (t.to_string(), json!(format!("Notes on {t}."))))
                .collect::<serde_json::Map<_, _>>()
        };
        let mut recommendation = sections(&[
            "Price Target",
            "Risk/Return Profile",
            "Investment Strategy",
            "Monitoring Points",
            "Executive Summary",
        ]);
        recommendation.insert(
            "Main Recommendation".into(),
            json!("- Decision: HOLD\n- Conviction: Low"),
        );
        let v = json!({
            "symbol": "msft",
            "analyzed_at": "2026-10-16T09:05:00-04:00",
            "price": 512.4,
            "metrics": {"PE_Ratio": 37.1, "Market_Cap": 3.81e12, "ROE": 0.3325},
            "fundamental_analysis": sections(&[
                "Company Overview",
                "Financial Performance",
                "Valuation",
                "Strengths and Weaknesses",
                "Trends and Outlook",
            ]),
            "market_analysis": sections(&[
                "Recent Major Events",
                "Market Sentiment",
                "Impact on Valuation",
                "Future Catalysts",
                "Risk Factors",
            ]),
            "recommendation": recommendation,
        });
        ReportInput::from_json(&v.to_string()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 0).unwrap()
    }

    #[test]
    fn renders_analysis_in_input_offset() {
        let md = render_input(
            input(),
            ReportKind::Analysis,
            DEFAULT_BRAND,
            now(),
            FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap();
        assert!(md.starts_with("# Complete Financial Analysis - MSFT\n"));
        assert!(md.contains("**Analysis Date:** 10/16/2026 at 09:05"));
        assert!(md.contains("**Current Price:** 512.40 USD"));
        assert!(md.contains("| P/E | 37.10x |"));
    }

    #[test]
    fn renders_recommendation_with_custom_brand() {
        let md = render_input(
            input(),
            ReportKind::Recommendation,
            "Desk Bot",
            now(),
            FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap();
        assert!(md.starts_with("# Investment Recommendation - MSFT\n"));
        assert!(md.contains("**Rating:** HOLD"));
        assert!(md.contains("*Recommendation generated by Desk Bot - Powered by ABACUS AI-ANALYSIS*"));
    }

    #[test]
    fn metrics_table_aligns_labels() {
        let rows = vec![("P/E", "37.10x".to_string()), ("Market Cap", "3.81T USD".to_string())];
        assert_eq!(
            metrics_table(&rows),
            "P/E         37.10x\nMarket Cap  3.81T USD\n"
        );
        assert_eq!(metrics_table(&[]), "no metrics\n");
    }
}
