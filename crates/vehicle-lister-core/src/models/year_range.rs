//! Production year-range descriptors.
//!
//! Catalog records describe their production span as text:
//!
//! - closed: `"2000/01 - 2005/12 XX"` (two dash-separated segments)
//! - in production: three dash-separated segments, e.g. `"2019/03 - - G20"`
//!
//! The start year is the leading integer before the first `/`. For closed
//! ranges the end year is the leading integer of the trimmed second segment.
//! Descriptors that fail to parse are kept as-is and simply never satisfy a
//! year constraint.

use crate::utils::parse_leading_int;

/// How a production span ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearEnd {
    /// Still in production
    Open,
    /// Closed range; None when the end year could not be parsed
    Closed(Option<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: Option<i64>,
    pub end: YearEnd,
}

impl YearRange {
    pub fn parse(descriptor: &str) -> Self {
        let start = descriptor.split('/').next().and_then(parse_leading_int);

        let segments: Vec<&str> = descriptor.split('-').collect();
        let end = if segments.len() == 3 {
            YearEnd::Open
        } else {
            let end_year = segments
                .get(1)
                .and_then(|second| second.trim().split('/').next())
                .and_then(parse_leading_int);
            YearEnd::Closed(end_year)
        };

        Self { start, end }
    }

    pub fn in_production(&self) -> bool {
        matches!(self.end, YearEnd::Open)
    }

    /// True when both ends needed for a comparison were parsed.
    pub fn is_well_formed(&self) -> bool {
        self.start.is_some() && !matches!(self.end, YearEnd::Closed(None))
    }

    /// Whether a record with this span was produced in `year`.
    /// Malformed spans never contain any year.
    pub fn contains(&self, year: i64) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        match self.end {
            YearEnd::Open => start <= year,
            YearEnd::Closed(Some(end)) => start <= year && year <= end,
            YearEnd::Closed(None) => false,
        }
    }

    /// Apply an optional year constraint; no year means every record passes.
    pub fn matches(&self, year: Option<i64>) -> bool {
        year.map_or(true, |y| self.contains(y))
    }
}
