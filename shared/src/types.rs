//! Common types used across the back-office

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, or `None` when `end` is before `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// True when both ranges share at least one day
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Default number of rows returned by list endpoints
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Upper bound for a caller-supplied list limit
pub const MAX_LIST_LIMIT: i64 = 500;

/// Clamp a requested list size into `1..=MAX_LIST_LIMIT`
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[test]
    fn test_range_rejects_reversed_dates() {
        assert!(DateRange::new(date(5), date(4)).is_none());
        assert!(DateRange::new(date(5), date(5)).is_some());
    }

    #[test]
    fn test_overlaps_on_shared_boundary() {
        let a = DateRange::new(date(1), date(5)).unwrap();
        let b = DateRange::new(date(5), date(9)).unwrap();
        let c = DateRange::new(date(6), date(9)).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.contains(date(5)));
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIST_LIMIT);
    }
}
