use crate::domain::metrics::FundamentalMetrics;
use crate::domain::security::{CompanyProfile, Ticker};
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    pub fn new(amount: f64, currency: &str) -> anyhow::Result<Self> {
        ensure!(
            amount.is_finite() && amount > 0.0,
            "price must be a positive number (got {amount})"
        );
        // Reports print two decimals; anything that shows as 0.00 cannot be checked.
        ensure!(
            (amount * 100.0).round() >= 1.0,
            "price {amount} is below the smallest displayable amount (0.01)"
        );
        let currency = currency.trim().to_ascii_uppercase();
        ensure!(
            currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()),
            "currency must be a three-letter code (got {currency:?})"
        );
        Ok(Self { amount, currency })
    }

    /// Parses a price as written in a report header: `229.87 USD`, `USD 229.87` or
    /// `$229.87`.
    pub fn parse_display(text: &str) -> anyhow::Result<Self> {
        let text = text.trim();
        let (dollar, rest) = match text.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let (amount, currency) = match tokens.as_slice() {
            [amount] if dollar => (*amount, DEFAULT_CURRENCY),
            [amount, currency] if looks_numeric(amount) => (*amount, *currency),
            [currency, amount] if !dollar && looks_numeric(amount) => (*amount, *currency),
            _ => bail!("price must be a number with a currency unit (got {text:?})"),
        };

        let amount = amount
            .replace(',', "")
            .parse::<f64>()
            .with_context(|| format!("price amount is not a number: {amount}"))?;
        if dollar {
            ensure!(
                currency.eq_ignore_ascii_case(DEFAULT_CURRENCY),
                "dollar sign conflicts with currency {currency}"
            );
        }
        Self::new(amount, currency)
    }
}

fn looks_numeric(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit())
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

/// Market and fundamental state of one security at the moment of analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub ticker: Ticker,
    pub analyzed_at: DateTime<FixedOffset>,
    pub price: Price,
    #[serde(default)]
    pub profile: CompanyProfile,
    #[serde(default)]
    pub metrics: FundamentalMetrics,
}

impl AnalysisSnapshot {
    pub fn validate(&self) -> anyhow::Result<()> {
        Price::new(self.price.amount, &self.price.currency)?;
        self.metrics
            .validate()
            .with_context(|| format!("invalid fundamental metrics for {}", self.ticker))
    }
}
