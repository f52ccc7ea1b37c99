/// A fixed, ordered set of numbered subsections within a report part.
pub trait SectionKind: Copy + Eq + Ord + std::fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn title(self) -> &'static str;

    /// 1-based position in the rendered document.
    fn number(self) -> usize {
        Self::ALL
            .iter()
            .position(|k| *k == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Matches a title written by a person or a model, ignoring case, punctuation and
    /// a leading `N.` number.
    fn from_title(title: &str) -> Option<Self> {
        let wanted = normalize_title(strip_number(title));
        Self::ALL
            .iter()
            .copied()
            .find(|k| normalize_title(k.title()) == wanted)
    }
}

pub fn titles<K: SectionKind>() -> Vec<&'static str> {
    K::ALL.iter().map(|k| k.title()).collect()
}

fn strip_number(title: &str) -> &str {
    let t = title.trim();
    let digits = t.len() - t.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return t;
    }
    match t[digits..].strip_prefix(['.', ')']) {
        Some(rest) => rest,
        None => t,
    }
}

/// Lower-cases, turns `&` into `and` and collapses punctuation to single spaces.
pub fn normalize_title(title: &str) -> String {
    let expanded = title.replace('&', " and ");
    let mut out = String::with_capacity(expanded.len());
    for c in expanded.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out.trim_end().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FundamentalSection {
    CompanyOverview,
    FinancialPerformance,
    Valuation,
    StrengthsAndWeaknesses,
    TrendsAndOutlook,
}

impl SectionKind for FundamentalSection {
    const ALL: &'static [Self] = &[
        Self::CompanyOverview,
        Self::FinancialPerformance,
        Self::Valuation,
        Self::StrengthsAndWeaknesses,
        Self::TrendsAndOutlook,
    ];

    fn title(self) -> &'static str {
        match self {
            Self::CompanyOverview => "Company Overview",
            Self::FinancialPerformance => "Financial Performance",
            Self::Valuation => "Valuation",
            Self::StrengthsAndWeaknesses => "Strengths and Weaknesses",
            Self::TrendsAndOutlook => "Trends and Outlook",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarketSection {
    RecentMajorEvents,
    MarketSentiment,
    ImpactOnValuation,
    FutureCatalysts,
    RiskFactors,
}

impl SectionKind for MarketSection {
    const ALL: &'static [Self] = &[
        Self::RecentMajorEvents,
        Self::MarketSentiment,
        Self::ImpactOnValuation,
        Self::FutureCatalysts,
        Self::RiskFactors,
    ];

    fn title(self) -> &'static str {
        match self {
            Self::RecentMajorEvents => "Recent Major Events",
            Self::MarketSentiment => "Market Sentiment",
            Self::ImpactOnValuation => "Impact on Valuation",
            Self::FutureCatalysts => "Future Catalysts",
            Self::RiskFactors => "Risk Factors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecommendationSection {
    MainRecommendation,
    PriceTarget,
    RiskReturnProfile,
    InvestmentStrategy,
    MonitoringPoints,
    ExecutiveSummary,
}

impl SectionKind for RecommendationSection {
    const ALL: &'static [Self] = &[
        Self::MainRecommendation,
        Self::PriceTarget,
        Self::RiskReturnProfile,
        Self::InvestmentStrategy,
        Self::MonitoringPoints,
        Self::ExecutiveSummary,
    ];

    fn title(self) -> &'static str {
        match self {
            Self::MainRecommendation => "Main Recommendation",
            Self::PriceTarget => "Price Target",
            Self::RiskReturnProfile => "Risk/Return Profile",
            Self::InvestmentStrategy => "Investment Strategy",
            Self::MonitoringPoints => "Monitoring Points",
            Self::ExecutiveSummary => "Executive Summary",
        }
    }
}
