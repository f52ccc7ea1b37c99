//! Format-conformance checks for rendered reports.

pub mod error;
pub mod outline;

use crate::domain::metrics::{parse_display_value, MetricKind, SignPolicy};
use crate::domain::recommendation::Rating;
use crate::domain::report::Disclaimer;
use crate::domain::section::{
    normalize_title, titles, FundamentalSection, MarketSection, RecommendationSection,
};
use crate::domain::security::Ticker;
use crate::domain::snapshot::Price;
use crate::time::analysis_clock::parse_analysis_timestamp;
use chrono::{Offset, Utc};
use outline::{block_text, parse_outline, split_numbered, Line, Outline, TopSection};
use serde::Serialize;
use std::fmt;

pub use error::ConformanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Analysis,
    Recommendation,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => f.write_str("analysis"),
            Self::Recommendation => f.write_str("recommendation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Title,
    Date,
    Price,
    SectionLayout,
    SubsectionCount,
    SubsectionOrder,
    DisclaimerPlacement,
    DisclaimerText,
    NegativeMetric,
    MissingRating,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule: Rule,
    pub line: Option<usize>,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: [{:?}] {}", self.rule, self.detail),
            None => write!(f, "[{:?}] {}", self.rule, self.detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConformanceReport {
    pub kind: ReportKind,
    pub ticker: Option<String>,
    pub violations: Vec<Violation>,
}

impl ConformanceReport {
    pub fn is_conformant(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> Result<(), ConformanceError> {
        if self.is_conformant() {
            return Ok(());
        }
        Err(ConformanceError {
            kind: self.kind,
            ticker: self.ticker.unwrap_or_else(|| "<unknown>".to_string()),
            violations: self.violations,
        })
    }
}

struct Layout {
    kind: ReportKind,
    title_prefix: &'static str,
    date_label: &'static str,
    price_label: &'static str,
    // Content sections and their numbered subsections; the disclaimer follows them.
    parts: Vec<(&'static str, Vec<&'static str>)>,
}

impl Layout {
    fn analysis() -> Self {
        Self {
            kind: ReportKind::Analysis,
            title_prefix: "Complete Financial Analysis",
            date_label: "Analysis Date",
            price_label: "Current Price",
            parts: vec![
                ("Fundamental Financial Analysis", titles::<FundamentalSection>()),
                ("Market Context and News", titles::<MarketSection>()),
            ],
        }
    }

    fn recommendation() -> Self {
        Self {
            kind: ReportKind::Recommendation,
            title_prefix: "Investment Recommendation",
            date_label: "Date",
            price_label: "Reference Price",
            parts: vec![(
                "Investment Recommendation",
                titles::<RecommendationSection>(),
            )],
        }
    }
}

/// Checks an analysis report against the fixed skeleton.
pub fn check_analysis(markdown: &str, disclaimer: &Disclaimer) -> ConformanceReport {
    Checker::new(Layout::analysis(), disclaimer).run(markdown)
}

/// Checks an investment recommendation against its skeleton.
pub fn check_recommendation(markdown: &str, disclaimer: &Disclaimer) -> ConformanceReport {
    Checker::new(Layout::recommendation(), disclaimer).run(markdown)
}

struct Checker<'d> {
    layout: Layout,
    disclaimer: &'d Disclaimer,
    violations: Vec<Violation>,
    ticker: Option<String>,
}

impl<'d> Checker<'d> {
    fn new(layout: Layout, disclaimer: &'d Disclaimer) -> Self {
        Self {
            layout,
            disclaimer,
            violations: Vec::new(),
            ticker: None,
        }
    }

    fn flag(&mut self, rule: Rule, line: Option<usize>, detail: impl Into<String>) {
        self.violations.push(Violation {
            rule,
            line,
            detail: detail.into(),
        });
    }

    fn run(mut self, markdown: &str) -> ConformanceReport {
        let outline = parse_outline(markdown);
        self.check_title(&outline);
        self.check_header(&outline.preamble);
        self.check_sections(&outline);
        self.check_underlined_headings(&outline);

        tracing::debug!(
            kind = %self.layout.kind,
            ticker = self.ticker.as_deref().unwrap_or("<unknown>"),
            violations = self.violations.len(),
            "conformance check finished"
        );

        ConformanceReport {
            kind: self.layout.kind,
            ticker: self.ticker,
            violations: self.violations,
        }
    }

    fn check_title(&mut self, outline: &Outline<'_>) {
        let Some(line) = outline.title else {
            self.flag(Rule::Title, None, "missing `# ` title line");
            return;
        };
        let text = outline::heading(line.text).map(|(_, t)| t).unwrap_or_default();
        let expected = self.layout.title_prefix;

        let parsed = text
            .split_once(" - ")
            .or_else(|| text.split_once(" – "))
            .filter(|(prefix, _)| prefix.trim().eq_ignore_ascii_case(expected));
        let Some((_, symbol)) = parsed else {
            self.flag(
                Rule::Title,
                Some(line.number),
                format!("title must read `{expected} - <TICKER>` (got {text:?})"),
            );
            return;
        };

        match Ticker::parse(symbol) {
            Ok(ticker) => self.ticker = Some(ticker.to_string()),
            Err(err) => self.flag(Rule::Title, Some(line.number), err.to_string()),
        }
    }

    fn check_header(&mut self, preamble: &[Line<'_>]) {
        let date_label = self.layout.date_label;
        match find_labeled(preamble, date_label) {
            None => self.flag(Rule::Date, None, format!("missing `**{date_label}:**` header")),
            Some((line, value)) => {
                let value = value.trim_start_matches("at ").trim();
                if let Err(err) = parse_analysis_timestamp(value, Utc.fix()) {
                    self.flag(Rule::Date, Some(line), err.to_string());
                }
            }
        }

        let price_label = self.layout.price_label;
        match find_labeled(preamble, price_label) {
            None => self.flag(Rule::Price, None, format!("missing `**{price_label}:**` header")),
            Some((line, value)) => {
                if let Err(err) = Price::parse_display(&value) {
                    self.flag(Rule::Price, Some(line), err.to_string());
                }
            }
        }
    }

    fn check_sections(&mut self, outline: &Outline<'_>) {
        let disclaimer_heading = self.disclaimer.heading();
        let mut expected: Vec<&'static str> = self.layout.parts.iter().map(|(t, _)| *t).collect();
        expected.push(disclaimer_heading);

        let found: Vec<&str> = outline.sections.iter().map(|s| s.title.as_str()).collect();
        let matches_layout = found.len() == expected.len()
            && found
                .iter()
                .zip(&expected)
                .all(|(f, e)| normalize_title(f) == normalize_title(e));
        if !matches_layout {
            self.flag(
                Rule::SectionLayout,
                None,
                format!("expected sections {expected:?} in order, found {found:?}"),
            );
        }

        let parts = self.layout.parts.clone();
        for (title, subsections) in &parts {
            match find_section(outline, title) {
                Some(section) => self.check_part(section, subsections),
                None => self.flag(
                    Rule::SectionLayout,
                    None,
                    format!("missing section `## {title}`"),
                ),
            }
        }

        self.check_disclaimer(outline);
    }

    fn check_part(&mut self, section: &TopSection<'_>, subsections: &[&'static str]) {
        let split = split_numbered(&section.body, subsections);
        if split.blocks.len() != subsections.len() {
            self.flag(
                Rule::SubsectionCount,
                Some(section.heading.number),
                format!(
                    "section `{}` must have exactly {} numbered subsections (found {})",
                    section.title,
                    subsections.len(),
                    split.blocks.len()
                ),
            );
        }

        for (i, block) in split.blocks.iter().enumerate() {
            let Some(expected) = subsections.get(i) else {
                break;
            };
            let number_ok = block.number == i + 1;
            let title_ok = normalize_title(&block.title) == normalize_title(expected);
            if !number_ok || !title_ok {
                self.flag(
                    Rule::SubsectionOrder,
                    Some(block.heading.number),
                    format!(
                        "expected `{}. {expected}`, found `{}. {}`",
                        i + 1,
                        block.number,
                        block.title
                    ),
                );
            }

            if self.layout.kind == ReportKind::Recommendation
                && i == 0
                && title_ok
                && Rating::find_in(&block.text()).is_none()
            {
                self.flag(
                    Rule::MissingRating,
                    Some(block.heading.number),
                    "main recommendation does not state STRONG BUY / BUY / HOLD / SELL / STRONG SELL",
                );
            }
        }

        self.check_metric_tables(&section.body);
    }

    // Setext headings would open new sections when the markdown is displayed.
    fn check_underlined_headings(&mut self, outline: &Outline<'_>) {
        let bodies = std::iter::once(&outline.preamble)
            .chain(outline.sections.iter().map(|s| &s.body));
        for body in bodies {
            if let Some((underline, level)) = outline::setext_heading(body) {
                self.flag(
                    Rule::SectionLayout,
                    Some(underline.number),
                    format!("underlined text forms a level-{level} heading"),
                );
            }
        }
    }

    fn check_metric_tables(&mut self, body: &[Line<'_>]) {
        for line in body {
            let Some((label, value)) = table_row(line.text) else {
                continue;
            };
            let Some(kind) = MetricKind::from_name(label) else {
                continue;
            };
            if kind.sign() != SignPolicy::NonNegative {
                continue;
            }
            if let Some(v) = parse_display_value(value) {
                if v < 0.0 {
                    self.flag(
                        Rule::NegativeMetric,
                        Some(line.number),
                        format!("{} must be non-negative (got {})", kind.label(), value.trim()),
                    );
                }
            }
        }
    }

    fn check_disclaimer(&mut self, outline: &Outline<'_>) {
        let heading = self.disclaimer.heading();
        let Some(pos) = outline
            .sections
            .iter()
            .position(|s| normalize_title(&s.title) == normalize_title(heading))
        else {
            self.flag(
                Rule::DisclaimerPlacement,
                None,
                format!("missing `## {heading}` section"),
            );
            return;
        };

        let section = &outline.sections[pos];
        if pos + 1 != outline.sections.len() {
            self.flag(
                Rule::DisclaimerPlacement,
                Some(section.heading.number),
                "disclaimer must be the final section",
            );
        }

        let body = block_text(&section.body);
        if !self.disclaimer.matches(&body) {
            self.flag(
                Rule::DisclaimerText,
                Some(section.heading.number),
                "disclaimer text differs from the fixed boilerplate",
            );
        }
    }
}

fn find_section<'o, 'a>(outline: &'o Outline<'a>, title: &str) -> Option<&'o TopSection<'a>> {
    let wanted = normalize_title(title);
    outline
        .sections
        .iter()
        .find(|s| normalize_title(&s.title) == wanted)
}

// `**Label:** value` (bold optional) -> (line number, value).
fn find_labeled(lines: &[Line<'_>], label: &str) -> Option<(usize, String)> {
    lines.iter().find_map(|line| {
        let plain: String = line.text.chars().filter(|c| *c != '*' && *c != '_').collect();
        let plain = plain.trim().trim_start_matches("- ").trim();
        let (key, value) = plain.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(label)
            .then(|| (line.number, value.trim().to_string()))
    })
}

// `| label | value |` -> (label, value); header and separator rows are skipped.
fn table_row(text: &str) -> Option<(&str, &str)> {
    let t = text.trim();
    let inner = t.strip_prefix('|')?.strip_suffix('|')?;
    let mut cells = inner.split('|');
    let label = cells.next()?.trim();
    let value = cells.next()?.trim();
    if label.chars().all(|c| c == '-' || c == ':' || c.is_whitespace()) {
        return None;
    }
    Some((label.trim_matches('*'), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::DEFAULT_BRAND;

    fn analysis_doc() -> String {
        let disclaimer = Disclaimer::analysis(DEFAULT_BRAND).to_markdown();
        format!(
            "# Complete Financial Analysis - AAPL\n\n\
             **Analysis Date:** 10/16/2026 at 14:30  \n\
             **Current Price:** 229.87 USD  \n\n\
             ---\n\n\
             ## 📊 Fundamental Financial Analysis\n\n\
             ### 1. Company Overview\n\nApple designs devices.\n\n\
             ### 2. Financial Performance\n\n\
             | Metric | Value |\n|---|---|\n| ROE | 145.81% |\n| P/E | 34.52x |\n\n\
             ### 3. Valuation\n\nRich.\n\n\
             ### 4. Strengths and Weaknesses\n\n1. **Brand**\n2. **Services**\n\n\
             ### 5. Trends and Outlook\n\nSteady.\n\n\
             ---\n\n\
             ## 📈 Market Context and News\n\n\
             ### 1. Recent Major Events\n\nLaunch.\n\n\
             ### 2. Market Sentiment\n\nPositive.\n\n\
             ### 3. Impact on Valuation\n\nNeutral.\n\n\
             ### 4. Future Catalysts\n\nAI features.\n\n\
             ### 5. Risk Factors\n\nRegulation.\n\n\
             ---\n\n\
             ## ⚠️ Disclaimer\n\n{disclaimer}\n"
        )
    }

    fn recommendation_doc() -> String {
        let disclaimer = Disclaimer::recommendation(DEFAULT_BRAND).to_markdown();
        format!(
            "# Investment Recommendation - AAPL\n\n\
             **Date:** 10/16/2026 at 14:30  \n\
             **Reference Price:** 229.87 USD  \n\
             **Rating:** HOLD  \n\n\
             ---\n\n\
             ## 💡 Investment Recommendation\n\n\
             ### 1. Main Recommendation\n\n- Decision: HOLD\n- Conviction: Moderate\n\n\
             ### 2. Price Target\n\n245.00 USD within 12 months.\n\n\
             ### 3. Risk/Return Profile\n\nModerate.\n\n\
             ### 4. Investment Strategy\n\nAdd on dips.\n\n\
             ### 5. Monitoring Points\n\nServices margin.\n\n\
             ### 6. Executive Summary\n\nQuality at a full price.\n\n\
             ---\n\n\
             ## ⚠️ Important Disclaimer\n\n{disclaimer}\n"
        )
    }

    fn check_rec(md: &str) -> ConformanceReport {
        check_recommendation(md, &Disclaimer::recommendation(DEFAULT_BRAND))
    }

    fn rules(report: &ConformanceReport) -> Vec<Rule> {
        report.violations.iter().map(|v| v.rule).collect()
    }

    fn check(md: &str) -> ConformanceReport {
        check_analysis(md, &Disclaimer::analysis(DEFAULT_BRAND))
    }

    #[test]
    fn accepts_well_formed_analysis() {
        let report = check(&analysis_doc());
        assert!(report.is_conformant(), "{:?}", report.violations);
        assert_eq!(report.ticker.as_deref(), Some("AAPL"));
    }

    #[test]
    fn flags_unparseable_date_and_price() {
        let md = analysis_doc()
            .replace("10/16/2026 at 14:30", "sometime last week")
            .replace("229.87 USD", "Price not available for AAPL");
        let report = check(&md);
        assert_eq!(rules(&report), vec![Rule::Date, Rule::Price]);
        assert_eq!(report.violations[0].line, Some(3));
    }

    #[test]
    fn flags_missing_header_fields() {
        let md = analysis_doc().replace("**Current Price:** 229.87 USD  \n", "");
        assert_eq!(rules(&check(&md)), vec![Rule::Price]);
    }

    #[test]
    fn flags_wrong_title() {
        let md = analysis_doc().replace("Complete Financial Analysis - AAPL", "Report on AAPL");
        assert_eq!(rules(&check(&md)), vec![Rule::Title]);
        assert_eq!(check(&md).ticker, None);
    }

    #[test]
    fn flags_missing_subsection() {
        let md = analysis_doc().replace("### 3. Impact on Valuation\n\nNeutral.\n\n", "");
        let report = check(&md);
        let r = rules(&report);
        assert!(r.contains(&Rule::SubsectionCount), "{r:?}");
        assert!(r.contains(&Rule::SubsectionOrder), "{r:?}");
    }

    #[test]
    fn flags_swapped_subsections() {
        let md = analysis_doc()
            .replace("### 1. Company Overview", "### 1. Valuation")
            .replace("### 3. Valuation", "### 3. Company Overview");
        let report = check(&md);
        assert_eq!(rules(&report), vec![Rule::SubsectionOrder, Rule::SubsectionOrder]);
    }

    #[test]
    fn flags_disclaimer_not_last() {
        let md = format!("{}\n## Appendix\n\nExtra.\n", analysis_doc());
        let r = rules(&check(&md));
        assert!(r.contains(&Rule::SectionLayout), "{r:?}");
        assert!(r.contains(&Rule::DisclaimerPlacement), "{r:?}");
    }

    #[test]
    fn flags_edited_disclaimer() {
        let md = analysis_doc().replace("for informational purposes only", "as advice");
        assert_eq!(rules(&check(&md)), vec![Rule::DisclaimerText]);
    }

    #[test]
    fn flags_negative_multiples_in_metric_table() {
        let md = analysis_doc().replace("| P/E | 34.52x |", "| P/E | -4.10x |");
        let report = check(&md);
        assert_eq!(rules(&report), vec![Rule::NegativeMetric]);

        // Signed metrics may be negative.
        let md = analysis_doc().replace("| ROE | 145.81% |", "| ROE | -12.00% |");
        assert!(check(&md).is_conformant());
    }

    #[test]
    fn accepts_model_style_numbering_without_headings() {
        let md = analysis_doc()
            .replace("### 1. Recent Major Events", "1. **RECENT MAJOR EVENTS**")
            .replace("### 2. Market Sentiment", "2. **MARKET SENTIMENT**")
            .replace("### 3. Impact on Valuation", "3. **IMPACT ON VALUATION**")
            .replace("### 4. Future Catalysts", "4. **FUTURE CATALYSTS**")
            .replace("### 5. Risk Factors", "5. **RISK FACTORS**");
        let report = check(&md);
        assert!(report.is_conformant(), "{:?}", report.violations);
    }

    #[test]
    fn numbered_bold_lists_do_not_split_model_style_sections() {
        let md = analysis_doc()
            .replace("### 1. Recent Major Events", "1. **RECENT MAJOR EVENTS**")
            .replace("### 2. Market Sentiment", "2. **MARKET SENTIMENT**")
            .replace("### 3. Impact on Valuation", "3. **IMPACT ON VALUATION**")
            .replace("### 4. Future Catalysts", "4. **FUTURE CATALYSTS**")
            .replace("### 5. Risk Factors", "5. **RISK FACTORS**")
            .replace(
                "AI features.",
                "   1. **On-device AI**\n   2. **New form factors**\n3. **Pricing**",
            );
        let report = check(&md);
        assert!(report.is_conformant(), "{:?}", report.violations);
    }

    #[test]
    fn flags_underlined_headings_inside_sections() {
        let md = analysis_doc().replace("Steady.", "Outlook\n===\nSteady.");
        let report = check(&md);
        assert_eq!(rules(&report), vec![Rule::SectionLayout]);
        assert!(report.violations[0].detail.contains("level-1"));

        let md = analysis_doc().replace("Launch.", "Launch\n---\nNew devices.");
        assert_eq!(rules(&check(&md)), vec![Rule::SectionLayout]);
    }

    #[test]
    fn accepts_well_formed_recommendation() {
        let report = check_rec(&recommendation_doc());
        assert!(report.is_conformant(), "{:?}", report.violations);
        assert_eq!(report.kind, ReportKind::Recommendation);
        assert_eq!(report.ticker.as_deref(), Some("AAPL"));
    }

    #[test]
    fn flags_recommendation_without_rating() {
        let md = recommendation_doc().replace("- Decision: HOLD", "- Stance: wait and see");
        let report = check_rec(&md);
        assert_eq!(rules(&report), vec![Rule::MissingRating]);
        assert_eq!(report.violations[0].line, Some(11));
    }

    #[test]
    fn flags_recommendation_without_reference_price() {
        let md = recommendation_doc().replace("**Reference Price:** 229.87 USD  \n", "");
        assert_eq!(rules(&check_rec(&md)), vec![Rule::Price]);

        let md = recommendation_doc().replace("**Date:**", "**Issued:**");
        assert_eq!(rules(&check_rec(&md)), vec![Rule::Date]);
    }

    #[test]
    fn flags_recommendation_with_five_subsections() {
        let md = recommendation_doc()
            .replace("### 6. Executive Summary\n\nQuality at a full price.\n\n", "");
        assert_eq!(rules(&check_rec(&md)), vec![Rule::SubsectionCount]);
    }

    #[test]
    fn recommendation_needs_its_own_disclaimer() {
        let md = recommendation_doc().replace("## ⚠️ Important Disclaimer", "## ⚠️ Disclaimer");
        let r = rules(&check_rec(&md));
        assert!(r.contains(&Rule::SectionLayout), "{r:?}");
        assert!(r.contains(&Rule::DisclaimerPlacement), "{r:?}");

        let analysis_footer = Disclaimer::analysis(DEFAULT_BRAND).to_markdown();
        let own_footer = Disclaimer::recommendation(DEFAULT_BRAND).to_markdown();
        let md = recommendation_doc().replace(&own_footer, &analysis_footer);
        assert_eq!(rules(&check_rec(&md)), vec![Rule::DisclaimerText]);
    }

    #[test]
    fn empty_document_reports_everything_missing() {
        let r = rules(&check(""));
        assert!(r.contains(&Rule::Title));
        assert!(r.contains(&Rule::Date));
        assert!(r.contains(&Rule::Price));
        assert!(r.contains(&Rule::SectionLayout));
        assert!(r.contains(&Rule::DisclaimerPlacement));
    }

    #[test]
    fn into_result_wraps_violations() {
        let err = check("").into_result().unwrap_err();
        assert_eq!(err.kind, ReportKind::Analysis);
        assert!(err.to_string().starts_with("analysis report for <unknown> is not conformant"));
    }

    #[test]
    fn parses_table_rows() {
        assert_eq!(table_row("| ROE | 145.81% |"), Some(("ROE", "145.81%")));
        assert_eq!(table_row("|---|---|"), None);
        assert_eq!(table_row("| **P/E** | 3x |"), Some(("P/E", "3x")));
        assert_eq!(table_row("not a table"), None);
    }
}
