use crate::domain::report::{Disclaimer, Sections};
use crate::domain::section::RecommendationSection;
use crate::domain::security::Ticker;
use crate::domain::snapshot::{AnalysisSnapshot, Price};
use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Rating {
    pub fn label(self) -> &'static str {
        match self {
            Self::StrongBuy => "STRONG BUY",
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
            Self::StrongSell => "STRONG SELL",
        }
    }

    /// Finds the decision stated in a main-recommendation narrative. Lines mentioning
    /// "decision" win over the rest of the text.
    pub fn find_in(text: &str) -> Option<Self> {
        let decision_lines = text
            .lines()
            .filter(|l| l.to_ascii_lowercase().contains("decision"));
        for line in decision_lines {
            if let Some(rating) = Self::first_in(line) {
                return Some(rating);
            }
        }
        Self::first_in(text)
    }

    fn first_in(text: &str) -> Option<Self> {
        let upper = text.to_ascii_uppercase();
        let words: Vec<&str> = upper
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|w| !w.is_empty())
            .collect();

        for (i, word) in words.iter().enumerate() {
            let next = words.get(i + 1).copied();
            match (*word, next) {
                ("STRONG", Some("BUY")) => return Some(Self::StrongBuy),
                ("STRONG", Some("SELL")) => return Some(Self::StrongSell),
                ("BUY", _) => return Some(Self::Buy),
                ("HOLD", _) => return Some(Self::Hold),
                ("SELL", _) => return Some(Self::Sell),
                _ => {}
            }
        }
        None
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Investment recommendation derived from the same snapshot as an analysis report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationReport {
    report_id: Uuid,
    ticker: Ticker,
    issued_at: DateTime<FixedOffset>,
    reference_price: Price,
    rating: Rating,
    sections: Sections<RecommendationSection>,
    disclaimer: Disclaimer,
}

impl RecommendationReport {
    pub fn assemble(
        snapshot: &AnalysisSnapshot,
        sections: Sections<RecommendationSection>,
        disclaimer: Disclaimer,
    ) -> anyhow::Result<Self> {
        snapshot
            .validate()
            .context("snapshot rejected before recommendation assembly")?;

        let main = sections.get(RecommendationSection::MainRecommendation);
        let rating = Rating::find_in(main.as_str()).with_context(|| {
            format!(
                "main recommendation for {} must state a decision \
                 (STRONG BUY / BUY / HOLD / SELL / STRONG SELL)",
                snapshot.ticker
            )
        })?;

        Ok(Self {
            report_id: Uuid::new_v4(),
            ticker: snapshot.ticker.clone(),
            issued_at: snapshot.analyzed_at,
            reference_price: snapshot.price.clone(),
            rating,
            sections,
            disclaimer,
        })
    }

    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn issued_at(&self) -> &DateTime<FixedOffset> {
        &self.issued_at
    }

    pub fn reference_price(&self) -> &Price {
        &self.reference_price
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn sections(&self) -> &Sections<RecommendationSection> {
        &self.sections
    }

    pub fn disclaimer(&self) -> &Disclaimer {
        &self.disclaimer
    }
}
