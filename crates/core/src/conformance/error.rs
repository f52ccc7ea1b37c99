use crate::conformance::{ReportKind, Violation};
use std::fmt;

/// A rendered report that failed its own conformance check.
#[derive(Debug, Clone)]
pub struct ConformanceError {
    pub kind: ReportKind,
    pub ticker: String,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ConformanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} report for {} is not conformant ({} violation(s))",
            self.kind,
            self.ticker,
            self.violations.len()
        )?;
        if let Some(first) = self.violations.first() {
            write!(f, ": {first}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConformanceError {}
