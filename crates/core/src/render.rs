//! Markdown rendering of assembled reports.
//!
//! Output is a pure function of the report: rendering the same report twice yields the
//! same bytes.

use crate::domain::metrics::MetricKind;
use crate::domain::recommendation::RecommendationReport;
use crate::domain::report::{AnalysisReport, Disclaimer, Sections};
use crate::domain::section::{FundamentalSection, SectionKind};
use crate::domain::security::CompanyProfile;
use crate::domain::snapshot::AnalysisSnapshot;
use crate::time::analysis_clock::format_report_date;

const RULE: &str = "---";

pub fn render_analysis(report: &AnalysisReport) -> String {
    let snapshot = report.snapshot();
    let mut out = String::new();

    out.push_str(&format!(
        "# Complete Financial Analysis - {}\n\n",
        snapshot.ticker
    ));
    out.push_str(&format!(
        "**Analysis Date:** {}  \n",
        format_report_date(&snapshot.analyzed_at)
    ));
    out.push_str(&format!("**Current Price:** {}  \n\n", snapshot.price));
    out.push_str(RULE);
    out.push_str("\n\n## 📊 Fundamental Financial Analysis\n\n");

    push_sections(&mut out, report.fundamentals(), |out, kind| match kind {
        FundamentalSection::CompanyOverview => push_profile(out, &snapshot.profile),
        FundamentalSection::FinancialPerformance => push_metrics(out, snapshot),
        _ => {}
    });

    out.push_str(RULE);
    out.push_str("\n\n## 📈 Market Context and News\n\n");
    push_sections(&mut out, report.market(), |_, _| {});

    push_disclaimer(&mut out, report.disclaimer());
    out
}

pub fn render_recommendation(report: &RecommendationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# Investment Recommendation - {}\n\n",
        report.ticker()
    ));
    out.push_str(&format!(
        "**Date:** {}  \n",
        format_report_date(report.issued_at())
    ));
    out.push_str(&format!(
        "**Reference Price:** {}  \n",
        report.reference_price()
    ));
    out.push_str(&format!("**Rating:** {}  \n\n", report.rating()));
    out.push_str(RULE);
    out.push_str("\n\n## 💡 Investment Recommendation\n\n");
    push_sections(&mut out, report.sections(), |_, _| {});

    push_disclaimer(&mut out, report.disclaimer());
    out
}

fn push_sections<K, F>(out: &mut String, sections: &Sections<K>, mut extras: F)
where
    K: SectionKind,
    F: FnMut(&mut String, K),
{
    for (kind, body) in sections.iter() {
        out.push_str(&format!("### {}. {}\n\n", kind.number(), kind.title()));
        extras(out, kind);
        out.push_str(body.as_str());
        out.push_str("\n\n");
    }
}

fn push_profile(out: &mut String, profile: &CompanyProfile) {
    if profile.is_empty() {
        return;
    }
    let industry = match (profile.sector.as_deref(), profile.industry.as_deref()) {
        (Some(sector), Some(industry)) => Some(format!("{sector} / {industry}")),
        (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
        (None, None) => None,
    };
    let rows = [
        ("Company", profile.name.clone()),
        ("Sector", industry),
        ("Headquarters", profile.headquarters()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            out.push_str(&format!("- **{label}:** {value}\n"));
        }
    }
    out.push('\n');
}

fn push_metrics(out: &mut String, snapshot: &AnalysisSnapshot) {
    if snapshot.metrics.is_empty() {
        return;
    }
    out.push_str("#### Key Metrics\n\n| Metric | Value |\n|---|---|\n");
    for (kind, value) in snapshot.metrics.iter() {
        out.push_str(&format!(
            "| {} | {} |\n",
            kind.label(),
            kind.format_value(value, &snapshot.price.currency)
        ));
    }
    out.push('\n');
}

fn push_disclaimer(out: &mut String, disclaimer: &Disclaimer) {
    out.push_str(RULE);
    out.push_str(&format!("\n\n## ⚠️ {}\n\n", disclaimer.heading()));
    out.push_str(&disclaimer.to_markdown());
    out.push('\n');
}

/// Metric table rows as `(label, formatted value)`, in display order.
pub fn metric_rows(snapshot: &AnalysisSnapshot) -> Vec<(&'static str, String)> {
    snapshot
        .metrics
        .iter()
        .map(|(kind, value): (MetricKind, f64)| {
            (kind.label(), kind.format_value(value, &snapshot.price.currency))
        })
        .collect()
}
