use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// How the analysis timestamp is written in report headers.
pub const REPORT_DATE_FORMAT: &str = "%m/%d/%Y at %H:%M";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    REPORT_DATE_FORMAT,
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Uses the explicit timestamp when given, otherwise the current time in `offset`.
/// Reports show minutes only, so the result is truncated to the minute.
pub fn resolve_analyzed_at(
    analyzed_at_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    offset: FixedOffset,
) -> anyhow::Result<DateTime<FixedOffset>> {
    let at = match analyzed_at_arg {
        Some(s) => parse_analysis_timestamp(s, offset)?,
        None => now_utc.with_timezone(&offset),
    };
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .context("failed to truncate analysis timestamp to the minute")
}

/// Accepts RFC 3339, the report header form and a few common date(-time) layouts.
/// Zone-less values are interpreted in `offset`.
pub fn parse_analysis_timestamp(
    s: &str,
    offset: FixedOffset,
) -> anyhow::Result<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(naive, offset);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            let naive = date
                .and_hms_opt(0, 0, 0)
                .context("invalid midnight for analysis date")?;
            return localize(naive, offset);
        }
    }

    bail!("unrecognised analysis timestamp: {s:?}")
}

pub fn format_report_date(at: &DateTime<FixedOffset>) -> String {
    at.format(REPORT_DATE_FORMAT).to_string()
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> anyhow::Result<DateTime<FixedOffset>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .with_context(|| format!("ambiguous local time {naive} at offset {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn defaults_to_now_truncated_to_minute() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 59).unwrap();
        let at = resolve_analyzed_at(None, now, utc()).unwrap();
        assert_eq!(format_report_date(&at), "10/16/2026 at 14:30");
        assert_eq!(at.second(), 0);
    }

    #[test]
    fn default_uses_display_offset() {
        // 2026-10-16 02:15 UTC is the previous evening in New York (UTC-4).
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 2, 15, 0).unwrap();
        let ny = FixedOffset::west_opt(4 * 3600).unwrap();
        let at = resolve_analyzed_at(None, now, ny).unwrap();
        assert_eq!(format_report_date(&at), "10/15/2026 at 22:15");
    }

    #[test]
    fn parses_report_header_form() {
        let at = parse_analysis_timestamp("10/16/2026 at 14:30", utc()).unwrap();
        assert_eq!(at, utc().with_ymd_and_hms(2026, 10, 16, 14, 30, 0).unwrap());
    }

    #[test]
    fn parses_rfc3339_and_keeps_its_offset() {
        let at = parse_analysis_timestamp("2026-10-16T09:45:00-04:00", utc()).unwrap();
        assert_eq!(at.offset().local_minus_utc(), -4 * 3600);
        assert_eq!(format_report_date(&at), "10/16/2026 at 09:45");
    }

    #[test]
    fn parses_plain_dates_as_midnight() {
        let at = parse_analysis_timestamp("2026-10-16", utc()).unwrap();
        assert_eq!(format_report_date(&at), "10/16/2026 at 00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_analysis_timestamp("yesterday", utc()).is_err());
        assert!(parse_analysis_timestamp("13/45/2026", utc()).is_err());
    }
}
