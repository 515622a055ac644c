//! Date ranges for temporal layer filters.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{DashboardError, DashboardResult};

/// An inclusive calendar date range.
///
/// Constructed freely (e.g. straight from a date picker) and checked with
/// [`DateRange::validate`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whole calendar years, January 1 of `start_year` through December 31
    /// of `end_year`. Returns `None` for years chrono cannot represent.
    pub fn from_years(start_year: i32, end_year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(start_year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(end_year, 12, 31)?,
        })
    }

    /// Fail with `InvalidRange` when `start > end`.
    pub fn validate(&self) -> DashboardResult<()> {
        if self.start > self.end {
            return Err(DashboardError::InvalidRange {
                start: self.start.to_string(),
                end: self.end.to_string(),
            });
        }
        Ok(())
    }

    /// Validate ordering and that both ends fall within `bounds`. Used for
    /// the configured slider default; user ranges only need [`validate`].
    ///
    /// [`validate`]: DateRange::validate
    pub fn validate_within(&self, bounds: &YearBounds) -> DashboardResult<()> {
        self.validate()?;
        if !bounds.contains(self.start.year()) || !bounds.contains(self.end.year()) {
            return Err(DashboardError::RangeOutOfBounds {
                start: self.start.to_string(),
                end: self.end.to_string(),
                min_year: bounds.min_year,
                max_year: bounds.max_year,
            });
        }
        Ok(())
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        date >= &self.start && date <= &self.end
    }

    /// Backend date filter form: ISO start inclusive, ISO end exclusive.
    pub fn to_filter_bounds(&self) -> (String, String) {
        let end_exclusive = self.end.succ_opt().unwrap_or(self.end);
        (
            self.start.format("%Y-%m-%d").to_string(),
            end_exclusive.format("%Y-%m-%d").to_string(),
        )
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Inclusive year span offered by the range slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearBounds {
    pub min_year: i32,
    pub max_year: i32,
}

impl YearBounds {
    pub fn contains(&self, year: i32) -> bool {
        year >= self.min_year && year <= self.max_year
    }
}

impl Default for YearBounds {
    fn default() -> Self {
        Self {
            min_year: 2015,
            max_year: 2024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_ordering() {
        assert!(DateRange::new(date(2023, 1, 1), date(2023, 6, 1)).validate().is_ok());
        assert!(DateRange::new(date(2023, 1, 1), date(2023, 1, 1)).validate().is_ok());

        let err = DateRange::new(date(2023, 6, 1), date(2023, 1, 1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRange { .. }));
    }

    #[test]
    fn test_validate_within_bounds() {
        let bounds = YearBounds::default();
        let range = DateRange::from_years(2020, 2024).unwrap();
        assert!(range.validate_within(&bounds).is_ok());

        let early = DateRange::from_years(2010, 2020).unwrap();
        assert!(matches!(
            early.validate_within(&bounds),
            Err(DashboardError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_filter_bounds_end_exclusive() {
        let range = DateRange::new(date(2023, 1, 1), date(2023, 6, 1));
        let (start, end) = range.to_filter_bounds();
        assert_eq!(start, "2023-01-01");
        assert_eq!(end, "2023-06-02");
    }

    #[test]
    fn test_from_years() {
        let range = DateRange::from_years(2020, 2024).unwrap();
        assert_eq!(range.start, date(2020, 1, 1));
        assert_eq!(range.end, date(2024, 12, 31));
        assert!(range.contains(&date(2022, 7, 15)));
    }
}
