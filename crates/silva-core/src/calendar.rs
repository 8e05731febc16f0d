//! Phenological period calendar.
//!
//! Period templates use the original settings syntax: two endpoints separated
//! by a comma, each `"(EXPR)-MM-DD"` where EXPR is `Y` optionally offset by an
//! integer (`Y-1` references the previous year). Six such periods cover one
//! target year; ordering and overlap are the caller's business and are not
//! validated here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named period window with a year-parameterized date-range template,
/// e.g. `WET1` = `"(Y-1)-12-01,(Y)-01-31"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDef {
    pub name: String,
    pub range: String,
}

/// A resolved, inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodDef {
    pub fn new(name: &str, range: &str) -> Self {
        Self {
            name: name.to_string(),
            range: range.to_string(),
        }
    }

    /// Resolve the template against a target year.
    pub fn resolve(&self, year: i32) -> Result<DateRange> {
        let (start, end) = self
            .range
            .split_once(',')
            .ok_or_else(|| Error::PeriodTemplate(self.range.clone()))?;

        Ok(DateRange {
            start: resolve_endpoint(start.trim(), year)?,
            end: resolve_endpoint(end.trim(), year)?,
        })
    }
}

fn resolve_endpoint(template: &str, year: i32) -> Result<NaiveDate> {
    let bad = || Error::PeriodTemplate(template.to_string());

    let rest = template.strip_prefix('(').ok_or_else(bad)?;
    let (expr, rest) = rest.split_once(')').ok_or_else(bad)?;

    let offset: i32 = match expr.trim().strip_prefix('Y').map(str::trim) {
        Some("") => 0,
        Some(tail) => tail.parse().map_err(|_| bad())?,
        None => return Err(bad()),
    };
    let resolved_year = year + offset;

    let (month, day) = rest
        .strip_prefix('-')
        .and_then(|md| md.split_once('-'))
        .ok_or_else(bad)?;
    let month: u32 = month.parse().map_err(|_| bad())?;
    let day: u32 = day.parse().map_err(|_| bad())?;

    NaiveDate::from_ymd_opt(resolved_year, month, day).ok_or(Error::InvalidDate {
        year: resolved_year,
        month,
        day,
    })
}

/// The six-period calendar used by the forest-plantation classification.
pub fn default_periods() -> Vec<PeriodDef> {
    vec![
        PeriodDef::new("WET1", "(Y-1)-12-01,(Y)-01-31"),
        PeriodDef::new("WET2", "(Y)-02-01,(Y)-03-31"),
        PeriodDef::new("DRY1", "(Y)-04-01,(Y)-05-31"),
        PeriodDef::new("DRY2", "(Y)-06-01,(Y)-07-31"),
        PeriodDef::new("DRY3", "(Y)-08-01,(Y)-09-30"),
        PeriodDef::new("WET3", "(Y)-10-01,(Y)-11-30"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn wet1_spans_previous_december() {
        let wet1 = PeriodDef::new("WET1", "(Y-1)-12-01,(Y)-01-31");
        let range = wet1.resolve(2015).unwrap();
        assert_eq!(range.start, date(2014, 12, 1));
        assert_eq!(range.end, date(2015, 1, 31));
    }

    #[test]
    fn same_year_period_resolves_directly() {
        let dry2 = PeriodDef::new("DRY2", "(Y)-06-01,(Y)-07-31");
        let range = dry2.resolve(2018).unwrap();
        assert_eq!(range.start, date(2018, 6, 1));
        assert_eq!(range.end, date(2018, 7, 31));
    }

    #[test]
    fn resolution_is_deterministic_across_calls() {
        for period in default_periods() {
            let a = period.resolve(2016).unwrap();
            let b = period.resolve(2016).unwrap();
            assert_eq!(a, b, "period {} resolved differently", period.name);
        }
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(PeriodDef::new("X", "(Y)-12-01").resolve(2015).is_err());
        assert!(PeriodDef::new("X", "Y-12-01,(Y)-01-31").resolve(2015).is_err());
        assert!(PeriodDef::new("X", "(Y)-02-30,(Y)-03-31").resolve(2015).is_err());
    }
}
