pub mod conformance;
pub mod domain;
pub mod render;
pub mod time;

pub mod config {
    use anyhow::Context;
    use chrono::FixedOffset;

    use crate::domain::report::DEFAULT_BRAND;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub brand: String,
        pub timezone_offset_minutes: i32,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let brand = std::env::var("FINBOT_BRAND")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_BRAND.to_string());

            let timezone_offset_minutes =
                parse_offset_minutes(std::env::var("FINBOT_TIMEZONE_OFFSET_MINUTES").ok())?;

            Ok(Self {
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                brand,
                timezone_offset_minutes,
            })
        }

        /// Offset used to stamp and display analysis timestamps that carry no zone.
        pub fn display_offset(&self) -> anyhow::Result<FixedOffset> {
            self.timezone_offset_minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .context("FINBOT_TIMEZONE_OFFSET_MINUTES is out of range")
        }
    }

    fn parse_offset_minutes(raw: Option<String>) -> anyhow::Result<i32> {
        match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(0),
            Some(s) => s.parse::<i32>().with_context(|| {
                format!("FINBOT_TIMEZONE_OFFSET_MINUTES must be a whole number of minutes (got {s:?})")
            }),
        }
    }

}
