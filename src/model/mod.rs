pub mod attendance;
pub mod credential;
pub mod employee;
pub mod leave_balance;
pub mod leave_request;
pub mod leave_type;
pub mod travel_request;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::HrError;

/// Inclusive calendar-date range. Construction guarantees `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, HrError> {
        if end < start {
            return Err(HrError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days counting both ends.
    pub fn days(&self) -> i32 {
        ((self.end - self.start).num_days() + 1) as i32
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn day_count_is_inclusive() {
        let range = DateRange::new(d("2024-01-10"), d("2024-01-12")).unwrap();
        assert_eq!(range.days(), 3);
        assert_eq!(DateRange::new(d("2024-01-10"), d("2024-01-10")).unwrap().days(), 1);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = DateRange::new(d("2024-01-12"), d("2024-01-10")).unwrap_err();
        assert!(matches!(err, HrError::InvalidRange { .. }));
    }

    #[test]
    fn overlap_touches_on_shared_day() {
        let range = DateRange::new(d("2024-01-10"), d("2024-01-12")).unwrap();
        assert!(range.overlaps(d("2024-01-12"), d("2024-01-15")));
        assert!(range.overlaps(d("2024-01-01"), d("2024-01-10")));
        assert!(range.overlaps(d("2024-01-11"), d("2024-01-11")));
        assert!(!range.overlaps(d("2024-01-13"), d("2024-01-15")));
        assert!(!range.overlaps(d("2024-01-01"), d("2024-01-09")));
    }
}
