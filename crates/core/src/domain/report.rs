use crate::conformance::outline::{
    heading, is_fence, lines_of, normalize_whitespace, setext_heading,
};
use crate::domain::section::{FundamentalSection, MarketSection, SectionKind};
use crate::domain::snapshot::AnalysisSnapshot;
use anyhow::{bail, ensure, Context};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DEFAULT_BRAND: &str = "Abacus FinBot";

const ANALYSIS_DISCLAIMER: &str = "This analysis is generated by artificial intelligence for \
informational purposes only. It does not constitute personalized financial advice. Always \
consult a qualified financial advisor before making investment decisions.";

const RECOMMENDATION_DISCLAIMER: &str = "This recommendation is based on automated analysis and \
does not constitute personalized financial advice. Investments involve risk of capital loss. \
Consult a financial advisor before any investment decision.";

/// Body text of one numbered subsection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Narrative(String);

impl Narrative {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let text = text.trim();
        ensure!(!text.is_empty(), "narrative must be non-empty");

        // Level 1-3 headings belong to the report skeleton.
        let mut in_fence = false;
        for line in text.lines() {
            if is_fence(line) {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some((level, _)) = heading(line) {
                if level <= 3 {
                    bail!("narrative must not contain level-{level} headings: {line:?}");
                }
            }
        }
        if let Some((underline, level)) = setext_heading(&lines_of(text)) {
            bail!(
                "narrative must not contain level-{level} headings: underline {:?} on line {}",
                underline.text,
                underline.number
            );
        }

        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One narrative per subsection of `K`, in fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections<K: SectionKind> {
    bodies: BTreeMap<K, Narrative>,
}

impl<K: SectionKind> Sections<K> {
    pub fn from_map(mut map: BTreeMap<K, Narrative>) -> anyhow::Result<Self> {
        let mut bodies = BTreeMap::new();
        for kind in K::ALL {
            let Some(body) = map.remove(kind) else {
                bail!("missing section {}. {}", kind.number(), kind.title());
            };
            bodies.insert(*kind, body);
        }
        Ok(Self { bodies })
    }

    pub fn get(&self, kind: K) -> &Narrative {
        // from_map guarantees every kind is present.
        &self.bodies[&kind]
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &Narrative)> + '_ {
        K::ALL.iter().map(|k| (*k, self.get(*k)))
    }
}

impl<K: SectionKind> Serialize for Sections<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(k, body)| (k.title(), body)))
    }
}

/// Fixed footer attached verbatim to every report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disclaimer {
    heading: &'static str,
    body: &'static str,
    attribution: String,
}

impl Disclaimer {
    pub fn analysis(brand: &str) -> Self {
        Self {
            heading: "Disclaimer",
            body: ANALYSIS_DISCLAIMER,
            attribution: format!("Analysis generated by {brand} - Powered by ABACUS-AI ANALYSIS"),
        }
    }

    pub fn recommendation(brand: &str) -> Self {
        Self {
            heading: "Important Disclaimer",
            body: RECOMMENDATION_DISCLAIMER,
            attribution: format!(
                "Recommendation generated by {brand} - Powered by ABACUS AI-ANALYSIS"
            ),
        }
    }

    pub fn heading(&self) -> &'static str {
        self.heading
    }

    pub fn body(&self) -> &'static str {
        self.body
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    pub fn to_markdown(&self) -> String {
        format!("{}\n\n*{}*", self.body, self.attribution)
    }

    /// Whitespace-insensitive comparison against a rendered disclaimer body.
    pub fn matches(&self, text: &str) -> bool {
        normalize_whitespace(text) == normalize_whitespace(&self.to_markdown())
    }
}

/// Complete analysis of one snapshot. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    report_id: Uuid,
    snapshot: AnalysisSnapshot,
    fundamentals: Sections<FundamentalSection>,
    market: Sections<MarketSection>,
    disclaimer: Disclaimer,
}

impl AnalysisReport {
    pub fn assemble(
        snapshot: AnalysisSnapshot,
        fundamentals: Sections<FundamentalSection>,
        market: Sections<MarketSection>,
        disclaimer: Disclaimer,
    ) -> anyhow::Result<Self> {
        snapshot
            .validate()
            .context("snapshot rejected before report assembly")?;

        let report = Self {
            report_id: Uuid::new_v4(),
            snapshot,
            fundamentals,
            market,
            disclaimer,
        };
        tracing::debug!(
            ticker = %report.snapshot.ticker,
            report_id = %report.report_id,
            metrics = report.snapshot.metrics.len(),
            "assembled analysis report"
        );
        Ok(report)
    }

    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn snapshot(&self) -> &AnalysisSnapshot {
        &self.snapshot
    }

    pub fn fundamentals(&self) -> &Sections<FundamentalSection> {
        &self.fundamentals
    }

    pub fn market(&self) -> &Sections<MarketSection> {
        &self.market
    }

    pub fn disclaimer(&self) -> &Disclaimer {
        &self.disclaimer
    }
}
