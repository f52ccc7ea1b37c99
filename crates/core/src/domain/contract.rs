use crate::conformance::outline::{parse_outline, split_numbered, strip_code_fence, Line};
use crate::domain::metrics::FundamentalMetrics;
use crate::domain::recommendation::RecommendationReport;
use crate::domain::report::{AnalysisReport, Disclaimer, Narrative, Sections};
use crate::domain::section::{
    titles, FundamentalSection, MarketSection, RecommendationSection, SectionKind,
};
use crate::domain::security::{CompanyProfile, Ticker};
use crate::domain::snapshot::{AnalysisSnapshot, Price, DEFAULT_CURRENCY};
use crate::time::analysis_clock::resolve_analyzed_at;
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Untrusted report input as produced upstream (data collection plus model-written
/// narratives). Nothing here is trusted until `validate_and_into_*` succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    #[serde(alias = "ticker")]
    pub symbol: String,
    #[serde(default)]
    pub analyzed_at: Option<String>,
    #[serde(alias = "current_price")]
    pub price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub profile: CompanyProfile,
    #[serde(default)]
    pub metrics: BTreeMap<String, Option<f64>>,
    pub fundamental_analysis: NarrativeInput,
    pub market_analysis: NarrativeInput,
    #[serde(default)]
    pub recommendation: Option<NarrativeInput>,
}

/// Narratives for one report part: either keyed by subsection title, or a single
/// markdown blob with numbered subsections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NarrativeInput {
    Sections(BTreeMap<String, String>),
    Markdown(String),
}

impl ReportInput {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str::<Self>(text).context("report input is not valid JSON for the input schema")
    }

    pub fn validate_and_into_snapshot(
        &self,
        now_utc: DateTime<Utc>,
        offset: FixedOffset,
    ) -> anyhow::Result<AnalysisSnapshot> {
        let ticker = Ticker::parse(&self.symbol).context("invalid symbol")?;
        let analyzed_at = resolve_analyzed_at(self.analyzed_at.as_deref(), now_utc, offset)
            .context("invalid analyzed_at")?;
        let currency = self
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CURRENCY);
        let price = Price::new(self.price, currency).context("invalid price")?;

        let metrics =
            FundamentalMetrics::from_named(self.metrics.iter().map(|(k, v)| (k.as_str(), *v)))?;
        metrics
            .validate()
            .with_context(|| format!("invalid fundamental metrics for {ticker}"))?;

        Ok(AnalysisSnapshot {
            ticker,
            analyzed_at,
            price,
            profile: self.profile.clone().normalized(),
            metrics,
        })
    }

    pub fn validate_and_into_analysis(
        self,
        now_utc: DateTime<Utc>,
        offset: FixedOffset,
        disclaimer: Disclaimer,
    ) -> anyhow::Result<AnalysisReport> {
        let snapshot = self.validate_and_into_snapshot(now_utc, offset)?;
        let fundamentals = self
            .fundamental_analysis
            .validate_and_into_sections::<FundamentalSection>()
            .context("invalid fundamental_analysis")?;
        let market = self
            .market_analysis
            .validate_and_into_sections::<MarketSection>()
            .context("invalid market_analysis")?;
        AnalysisReport::assemble(snapshot, fundamentals, market, disclaimer)
    }

    pub fn validate_and_into_recommendation(
        self,
        now_utc: DateTime<Utc>,
        offset: FixedOffset,
        disclaimer: Disclaimer,
    ) -> anyhow::Result<RecommendationReport> {
        let snapshot = self.validate_and_into_snapshot(now_utc, offset)?;
        let Some(recommendation) = self.recommendation else {
            bail!("input for {} has no recommendation narratives", snapshot.ticker);
        };
        let sections = recommendation
            .validate_and_into_sections::<RecommendationSection>()
            .context("invalid recommendation")?;
        RecommendationReport::assemble(&snapshot, sections, disclaimer)
    }
}

impl NarrativeInput {
    pub fn validate_and_into_sections<K: SectionKind>(self) -> anyhow::Result<Sections<K>> {
        let mut bodies = BTreeMap::<K, Narrative>::new();
        match self {
            NarrativeInput::Sections(map) => {
                for (title, text) in map {
                    let Some(kind) = K::from_title(&title) else {
                        bail!("unknown section: {title:?}");
                    };
                    insert_unique(&mut bodies, kind, &text)?;
                }
            }
            NarrativeInput::Markdown(text) => {
                let text = strip_code_fence(&text);
                let outline = parse_outline(text);
                ensure!(
                    outline.title.is_none() && outline.sections.is_empty(),
                    "narrative markdown must not contain `#` or `##` headings"
                );
                let lines: Vec<Line<'_>> = outline.preamble;
                let split = split_numbered(&lines, &titles::<K>());
                if split.preamble.iter().any(|l| !l.text.trim().is_empty()) {
                    tracing::debug!(
                        lines = split.preamble.len(),
                        "ignoring text before the first numbered section"
                    );
                }
                for block in &split.blocks {
                    let Some(kind) = K::from_title(&block.title) else {
                        bail!(
                            "unknown section {}. {:?} (line {})",
                            block.number,
                            block.title,
                            block.heading.number
                        );
                    };
                    ensure!(
                        block.number == kind.number(),
                        "section {:?} is numbered {}, expected {}",
                        kind.title(),
                        block.number,
                        kind.number()
                    );
                    insert_unique(&mut bodies, kind, &block.text())?;
                }
            }
        }
        Sections::from_map(bodies)
    }
}

fn insert_unique<K: SectionKind>(
    bodies: &mut BTreeMap<K, Narrative>,
    kind: K,
    text: &str,
) -> anyhow::Result<()> {
    let narrative =
        Narrative::parse(text).with_context(|| format!("invalid section {:?}", kind.title()))?;
    ensure!(
        bodies.insert(kind, narrative).is_none(),
        "duplicate section: {:?}",
        kind.title()
    );
    Ok(())
}
