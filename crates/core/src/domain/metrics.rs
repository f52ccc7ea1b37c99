use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    MarketCap,
    Employees,
    ReturnOnEquity,
    ReturnOnAssets,
    GrossMargin,
    EbitdaMargin,
    RevenueGrowth,
    Ebitda,
    TotalCash,
    FreeCashFlow,
    OperatingCashFlow,
    Eps,
    PriceToEarnings,
    PriceToBook,
    PriceToSales,
    EvToEbitda,
    DividendYield,
    DividendRate,
    FiftyTwoWeekLow,
    FiftyTwoWeekHigh,
    FiftyDayAverage,
    TwoHundredDayAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    /// Stored as a fraction: 0.25 is 25%.
    Percent,
    /// Amount in the snapshot currency.
    Currency,
    /// Multiple, e.g. a P/E of 34.5.
    Ratio,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPolicy {
    NonNegative,
    Signed,
}

impl MetricKind {
    pub const ALL: [MetricKind; 22] = [
        MetricKind::MarketCap,
        MetricKind::Employees,
        MetricKind::ReturnOnEquity,
        MetricKind::ReturnOnAssets,
        MetricKind::GrossMargin,
        MetricKind::EbitdaMargin,
        MetricKind::RevenueGrowth,
        MetricKind::Ebitda,
        MetricKind::TotalCash,
        MetricKind::FreeCashFlow,
        MetricKind::OperatingCashFlow,
        MetricKind::Eps,
        MetricKind::PriceToEarnings,
        MetricKind::PriceToBook,
        MetricKind::PriceToSales,
        MetricKind::EvToEbitda,
        MetricKind::DividendYield,
        MetricKind::DividendRate,
        MetricKind::FiftyTwoWeekLow,
        MetricKind::FiftyTwoWeekHigh,
        MetricKind::FiftyDayAverage,
        MetricKind::TwoHundredDayAverage,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::MarketCap => "market_cap",
            Self::Employees => "employees",
            Self::ReturnOnEquity => "return_on_equity",
            Self::ReturnOnAssets => "return_on_assets",
            Self::GrossMargin => "gross_margin",
            Self::EbitdaMargin => "ebitda_margin",
            Self::RevenueGrowth => "revenue_growth",
            Self::Ebitda => "ebitda",
            Self::TotalCash => "total_cash",
            Self::FreeCashFlow => "free_cash_flow",
            Self::OperatingCashFlow => "operating_cash_flow",
            Self::Eps => "eps",
            Self::PriceToEarnings => "price_to_earnings",
            Self::PriceToBook => "price_to_book",
            Self::PriceToSales => "price_to_sales",
            Self::EvToEbitda => "ev_to_ebitda",
            Self::DividendYield => "dividend_yield",
            Self::DividendRate => "dividend_rate",
            Self::FiftyTwoWeekLow => "fifty_two_week_low",
            Self::FiftyTwoWeekHigh => "fifty_two_week_high",
            Self::FiftyDayAverage => "fifty_day_average",
            Self::TwoHundredDayAverage => "two_hundred_day_average",
        }
    }

    /// Label used in rendered metric tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::MarketCap => "Market Cap",
            Self::Employees => "Employees",
            Self::ReturnOnEquity => "ROE",
            Self::ReturnOnAssets => "ROA",
            Self::GrossMargin => "Gross Margin",
            Self::EbitdaMargin => "EBITDA Margin",
            Self::RevenueGrowth => "Revenue Growth",
            Self::Ebitda => "EBITDA",
            Self::TotalCash => "Total Cash",
            Self::FreeCashFlow => "Free Cash Flow",
            Self::OperatingCashFlow => "Operating Cash Flow",
            Self::Eps => "EPS",
            Self::PriceToEarnings => "P/E",
            Self::PriceToBook => "P/B",
            Self::PriceToSales => "P/S",
            Self::EvToEbitda => "EV/EBITDA",
            Self::DividendYield => "Dividend Yield",
            Self::DividendRate => "Dividend Rate",
            Self::FiftyTwoWeekLow => "52-Week Low",
            Self::FiftyTwoWeekHigh => "52-Week High",
            Self::FiftyDayAverage => "50-Day Average",
            Self::TwoHundredDayAverage => "200-Day Average",
        }
    }

    // Normalised spellings seen in upstream payloads (yfinance-style keys).
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::MarketCap => &["marketcap"],
            Self::Employees => &["full_time_employees", "fulltimeemployees", "employee_count"],
            Self::ReturnOnEquity => &["roe", "returnonequity"],
            Self::ReturnOnAssets => &["roa", "returnonassets"],
            Self::GrossMargin => &["gross_margins", "grossmargins"],
            Self::EbitdaMargin => &["ebitda_margins", "ebitdamargins"],
            Self::RevenueGrowth => &["revenuegrowth"],
            Self::Ebitda => &[],
            Self::TotalCash => &["cash", "totalcash"],
            Self::FreeCashFlow => &["fcf", "freecashflow", "free_cashflow"],
            Self::OperatingCashFlow => &["operatingcashflow", "operating_cashflow"],
            Self::Eps => &["trailing_eps", "trailingeps"],
            Self::PriceToEarnings => &["pe", "p_e", "pe_ratio", "trailing_pe", "trailingpe"],
            Self::PriceToBook => &["pb", "p_b", "pb_ratio", "pricetobook"],
            Self::PriceToSales => &["ps", "p_s", "ps_ratio", "price_to_sales_trailing_12_months"],
            Self::EvToEbitda => &["ev_ebitda", "enterprise_to_ebitda", "enterprisetoebitda"],
            Self::DividendYield => &["dividendyield"],
            Self::DividendRate => &["dividendrate"],
            Self::FiftyTwoWeekLow => &["52w_low", "52_week_low", "fiftytwoweeklow"],
            Self::FiftyTwoWeekHigh => &["52w_high", "52_week_high", "fiftytwoweekhigh"],
            Self::FiftyDayAverage => &["50d_average", "50_day_average", "fiftydayaverage"],
            Self::TwoHundredDayAverage => {
                &["200d_average", "200_day_average", "twohundreddayaverage"]
            }
        }
    }

    /// Resolves a metric from its key, table label or a known alias, ignoring case
    /// and punctuation.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|kind| {
            kind.key() == wanted
                || normalize_name(kind.label()) == wanted
                || kind.aliases().contains(&wanted.as_str())
        })
    }

    pub fn unit(self) -> MetricUnit {
        match self {
            Self::ReturnOnEquity
            | Self::ReturnOnAssets
            | Self::GrossMargin
            | Self::EbitdaMargin
            | Self::RevenueGrowth
            | Self::DividendYield => MetricUnit::Percent,
            Self::MarketCap
            | Self::Ebitda
            | Self::TotalCash
            | Self::FreeCashFlow
            | Self::OperatingCashFlow
            | Self::Eps
            | Self::DividendRate
            | Self::FiftyTwoWeekLow
            | Self::FiftyTwoWeekHigh
            | Self::FiftyDayAverage
            | Self::TwoHundredDayAverage => MetricUnit::Currency,
            Self::PriceToEarnings | Self::PriceToBook | Self::PriceToSales | Self::EvToEbitda => {
                MetricUnit::Ratio
            }
            Self::Employees => MetricUnit::Count,
        }
    }

    /// Returns, margins after costs, growth and cash flows can legitimately go negative;
    /// multiples, yields, balances and prices cannot.
    pub fn sign(self) -> SignPolicy {
        match self {
            Self::ReturnOnEquity
            | Self::ReturnOnAssets
            | Self::EbitdaMargin
            | Self::RevenueGrowth
            | Self::Ebitda
            | Self::FreeCashFlow
            | Self::OperatingCashFlow
            | Self::Eps => SignPolicy::Signed,
            _ => SignPolicy::NonNegative,
        }
    }

    pub fn format_value(self, value: f64, currency: &str) -> String {
        match self.unit() {
            MetricUnit::Percent => format!("{:.2}%", value * 100.0),
            MetricUnit::Currency => format_currency(value, currency),
            MetricUnit::Ratio => format!("{value:.2}x"),
            MetricUnit::Count => format_count(value),
        }
    }
}

fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

const CURRENCY_SCALES: [(f64, &str); 4] = [(1.0, ""), (1e6, "M"), (1e9, "B"), (1e12, "T")];

fn format_currency(value: f64, currency: &str) -> String {
    let cents = |v: f64| (v * 100.0).round() / 100.0;
    let mut i = CURRENCY_SCALES
        .iter()
        .rposition(|(scale, _)| value.abs() >= *scale)
        .unwrap_or(0);
    let mut scaled = cents(value / CURRENCY_SCALES[i].0);
    // 999.999M rounds to 1000.00M, which is shown as 1.00B.
    while i + 1 < CURRENCY_SCALES.len()
        && scaled.abs() >= CURRENCY_SCALES[i + 1].0 / CURRENCY_SCALES[i].0
    {
        i += 1;
        scaled = cents(value / CURRENCY_SCALES[i].0);
    }
    format!("{scaled:.2}{} {currency}", CURRENCY_SCALES[i].1)
}

/// Largest count accepted by [`FundamentalMetrics::validate`]; well inside `i64`.
const MAX_COUNT: f64 = 1e15;

fn format_count(value: f64) -> String {
    let n = value.round() as i64;
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Parses a value as rendered by [`MetricKind::format_value`] (or written by hand in a
/// similar style) back into a number. Percentages come back as fractions.
pub fn parse_display_value(text: &str) -> Option<f64> {
    let mut s: String = text
        .trim()
        .chars()
        .filter(|c| *c != '*' && *c != ',' && *c != '`')
        .collect();

    if let Some((head, tail)) = s.rsplit_once(' ') {
        if tail.len() == 3 && tail.chars().all(|c| c.is_ascii_alphabetic()) {
            s = head.trim().to_string();
        }
    }

    let negative_dollar = s.starts_with("-$");
    let mut s = s.replacen('$', "", 1);
    if negative_dollar {
        s = format!("-{}", s.trim_start_matches('-'));
    }

    let (number, scale) = match s.chars().last()? {
        '%' => (&s[..s.len() - 1], 0.01),
        'x' | 'X' => (&s[..s.len() - 1], 1.0),
        'T' => (&s[..s.len() - 1], 1e12),
        'B' => (&s[..s.len() - 1], 1e9),
        'M' => (&s[..s.len() - 1], 1e6),
        'K' => (&s[..s.len() - 1], 1e3),
        _ => (s.as_str(), 1.0),
    };

    let value = number.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value * scale)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundamentalMetrics(BTreeMap<MetricKind, f64>);

impl FundamentalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds metrics from loosely named upstream keys. `None` values (metrics the
    /// provider did not report) are skipped.
    pub fn from_named<'a, I>(entries: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Option<f64>)>,
    {
        let mut out = Self::new();
        let mut sources = BTreeMap::<MetricKind, &str>::new();
        for (name, value) in entries {
            let Some(kind) = MetricKind::from_name(name) else {
                bail!("unknown metric: {name}");
            };
            if let Some(previous) = sources.insert(kind, name) {
                bail!(
                    "metric {} given twice (as {previous} and {name})",
                    kind.key()
                );
            }
            if let Some(value) = value {
                out.insert(kind, value);
            }
        }
        Ok(out)
    }

    pub fn insert(&mut self, kind: MetricKind, value: f64) -> Option<f64> {
        self.0.insert(kind, value)
    }

    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        self.0.get(&kind).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks every value before it is allowed into a report.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (kind, value) in self.iter() {
            ensure!(
                value.is_finite(),
                "{} must be a finite number (got {value})",
                kind.label()
            );
            if kind.sign() == SignPolicy::NonNegative {
                ensure!(
                    value >= 0.0,
                    "{} must be non-negative (got {value})",
                    kind.label()
                );
            }
            if kind.unit() == MetricUnit::Count {
                ensure!(
                    value.fract() == 0.0,
                    "{} must be a whole number (got {value})",
                    kind.label()
                );
                ensure!(
                    value.abs() <= MAX_COUNT,
                    "{} is out of range (got {value})",
                    kind.label()
                );
            }
        }

        if let (Some(low), Some(high)) = (
            self.get(MetricKind::FiftyTwoWeekLow),
            self.get(MetricKind::FiftyTwoWeekHigh),
        ) {
            ensure!(
                low <= high,
                "52-week low ({low}) must not exceed 52-week high ({high})"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_labels_and_upstream_aliases() {
        assert_eq!(MetricKind::from_name("ROE"), Some(MetricKind::ReturnOnEquity));
        assert_eq!(MetricKind::from_name("PE_Ratio"), Some(MetricKind::PriceToEarnings));
        assert_eq!(MetricKind::from_name("P/E"), Some(MetricKind::PriceToEarnings));
        assert_eq!(MetricKind::from_name("EV/EBITDA"), Some(MetricKind::EvToEbitda));
        assert_eq!(MetricKind::from_name("52W_Low"), Some(MetricKind::FiftyTwoWeekLow));
        assert_eq!(
            MetricKind::from_name("Gross_Margins"),
            Some(MetricKind::GrossMargin)
        );
        assert_eq!(MetricKind::from_name("free cash flow"), Some(MetricKind::FreeCashFlow));
        assert_eq!(MetricKind::from_name("beta"), None);
        assert_eq!(MetricKind::from_name("  "), None);
    }

    #[test]
    fn every_label_round_trips_through_from_name() {
        for kind in MetricKind::ALL {
            assert_eq!(MetricKind::from_name(kind.label()), Some(kind), "{kind:?}");
            assert_eq!(MetricKind::from_name(kind.key()), Some(kind), "{kind:?}");
        }
    }

    #[test]
    fn formats_values_by_unit() {
        assert_eq!(MetricKind::GrossMargin.format_value(0.46206, "USD"), "46.21%");
        assert_eq!(MetricKind::MarketCap.format_value(3.52e12, "USD"), "3.52T USD");
        assert_eq!(MetricKind::TotalCash.format_value(61.8e9, "USD"), "61.80B USD");
        assert_eq!(MetricKind::FreeCashFlow.format_value(-12.5e6, "EUR"), "-12.50M EUR");
        assert_eq!(MetricKind::FiftyTwoWeekHigh.format_value(260.1, "USD"), "260.10 USD");
        assert_eq!(MetricKind::PriceToEarnings.format_value(34.519, "USD"), "34.52x");
        assert_eq!(MetricKind::Employees.format_value(164000.0, "USD"), "164,000");
        assert_eq!(MetricKind::Employees.format_value(999.0, "USD"), "999");
    }

    #[test]
    fn currency_suffix_follows_the_rounded_value() {
        assert_eq!(MetricKind::TotalCash.format_value(999_999_999.0, "USD"), "1.00B USD");
        assert_eq!(MetricKind::MarketCap.format_value(999.996e9, "USD"), "1.00T USD");
        assert_eq!(MetricKind::FreeCashFlow.format_value(-999_999.999, "USD"), "-1.00M USD");
        assert_eq!(MetricKind::TotalCash.format_value(995e6, "USD"), "995.00M USD");
        assert_eq!(MetricKind::TotalCash.format_value(994_999.0, "USD"), "994999.00 USD");
        assert_eq!(MetricKind::TotalCash.format_value(999.994e6, "USD"), "999.99M USD");
    }

    #[test]
    fn validate_bounds_counts() {
        let mut metrics = FundamentalMetrics::new();
        metrics.insert(MetricKind::Employees, 1e19);
        let err = metrics.validate().unwrap_err().to_string();
        assert!(err.contains("Employees is out of range"), "{err}");

        metrics.insert(MetricKind::Employees, 2_100_000.0);
        assert!(metrics.validate().is_ok());
    }

    fn approx(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|v| (v - expected).abs() <= expected.abs() * 1e-9)
    }

    #[test]
    fn parses_displayed_values_back() {
        assert!(approx(parse_display_value("46.21%"), 0.4621));
        assert!(approx(parse_display_value("3.52T USD"), 3.52e12));
        assert!(approx(parse_display_value("-12.50M EUR"), -12.5e6));
        assert!(approx(parse_display_value("34.52x"), 34.52));
        assert!(approx(parse_display_value("164,000"), 164000.0));
        assert!(approx(parse_display_value("$1.25"), 1.25));
        assert!(approx(parse_display_value("-$3.10"), -3.10));
        assert!(approx(parse_display_value("**-4.5x**"), -4.5));
        assert_eq!(parse_display_value("n/a"), None);
        assert_eq!(parse_display_value(""), None);
    }

    #[test]
    fn from_named_skips_missing_values_and_rejects_unknown_keys() {
        let metrics = FundamentalMetrics::from_named([
            ("ROE", Some(1.4581)),
            ("Dividend_Yield", None),
            ("PE_Ratio", Some(34.5)),
        ])
        .unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.get(MetricKind::ReturnOnEquity), Some(1.4581));
        assert_eq!(metrics.get(MetricKind::DividendYield), None);

        assert!(FundamentalMetrics::from_named([("beta", Some(1.2))]).is_err());
        assert!(
            FundamentalMetrics::from_named([("ROE", Some(0.1)), ("return_on_equity", Some(0.2))])
                .is_err()
        );
    }

    #[test]
    fn validate_enforces_sign_policy() {
        let mut metrics = FundamentalMetrics::new();
        metrics.insert(MetricKind::ReturnOnEquity, -0.12);
        metrics.insert(MetricKind::FreeCashFlow, -1.0e9);
        assert!(metrics.validate().is_ok());

        metrics.insert(MetricKind::PriceToEarnings, -3.0);
        let err = metrics.validate().unwrap_err().to_string();
        assert!(err.contains("P/E"), "{err}");
    }

    #[test]
    fn validate_rejects_non_finite_fractional_counts_and_inverted_ranges() {
        let mut metrics = FundamentalMetrics::new();
        metrics.insert(MetricKind::GrossMargin, f64::NAN);
        assert!(metrics.validate().is_err());

        let mut metrics = FundamentalMetrics::new();
        metrics.insert(MetricKind::Employees, 10.5);
        assert!(metrics.validate().is_err());

        let mut metrics = FundamentalMetrics::new();
        metrics.insert(MetricKind::FiftyTwoWeekLow, 200.0);
        metrics.insert(MetricKind::FiftyTwoWeekHigh, 150.0);
        assert!(metrics.validate().is_err());
    }

    #[test]
    fn serializes_with_snake_case_keys() {
        let mut metrics = FundamentalMetrics::new();
        metrics.insert(MetricKind::EvToEbitda, 26.1);
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json, serde_json::json!({"ev_to_ebitda": 26.1}));
    }
}
