// src/table/mod.rs

pub mod error;
pub mod read;

pub use error::TableError;
pub use read::{read_comparison_table, write_comparison_table};

use std::collections::HashSet;

/// One calendar month of paired production values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyComparisonRecord {
    pub month: u8,
    /// Physical-model estimate.
    pub predicted: f64,
    /// Metered production.
    pub actual: f64,
    /// (actual - predicted) / actual. NaN or infinite when `actual` is zero.
    pub error: f64,
}

impl MonthlyComparisonRecord {
    /// Build a record and derive its relative error.
    pub fn new(month: u8, predicted: f64, actual: f64) -> Self {
        Self {
            month,
            predicted,
            actual,
            error: relative_error(predicted, actual),
        }
    }
}

pub fn relative_error(predicted: f64, actual: f64) -> f64 {
    (actual - predicted) / actual
}

/// The monthly records of one dataset, kept in file row order.
///
/// Row order is not guaranteed to be chronological; use [`ComparisonTable::chronological`]
/// when month order matters.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    records: Vec<MonthlyComparisonRecord>,
}

impl ComparisonTable {
    /// Validate month keys and wrap the records.
    pub fn from_records(records: Vec<MonthlyComparisonRecord>) -> Result<Self, TableError> {
        if records.is_empty() {
            return Err(TableError::Empty);
        }

        let mut seen = HashSet::with_capacity(records.len());
        for rec in &records {
            if !(1..=12).contains(&rec.month) {
                return Err(TableError::InvalidMonth(f64::from(rec.month)));
            }
            if !seen.insert(rec.month) {
                return Err(TableError::DuplicateMonth(rec.month));
            }
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[MonthlyComparisonRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Actual values in row order.
    pub fn actual(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.actual).collect()
    }

    /// Predicted values in row order.
    pub fn predicted(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.predicted).collect()
    }

    /// Records sorted by month.
    pub fn chronological(&self) -> Vec<MonthlyComparisonRecord> {
        let mut sorted = self.records.clone();
        sorted.sort_by_key(|r| r.month);
        sorted
    }
}

/// Convert a parsed month cell into a month key.
pub(crate) fn month_from_f64(value: f64) -> Result<u8, TableError> {
    if value.fract() != 0.0 || !(1.0..=12.0).contains(&value) {
        return Err(TableError::InvalidMonth(value));
    }
    Ok(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_duplicate_months() {
        let recs = vec![
            MonthlyComparisonRecord::new(3, 1.0, 2.0),
            MonthlyComparisonRecord::new(3, 1.5, 2.5),
        ];
        let err = ComparisonTable::from_records(recs).unwrap_err();
        assert!(matches!(err, TableError::DuplicateMonth(3)));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            ComparisonTable::from_records(Vec::new()),
            Err(TableError::Empty)
        ));
    }

    #[test]
    fn test_row_order_is_preserved() {
        let recs = vec![
            MonthlyComparisonRecord::new(12, 10.0, 11.0),
            MonthlyComparisonRecord::new(1, 20.0, 21.0),
            MonthlyComparisonRecord::new(6, 30.0, 31.0),
        ];
        let table = ComparisonTable::from_records(recs).unwrap();
        assert_eq!(table.actual(), vec![11.0, 21.0, 31.0]);
        let months: Vec<u8> = table.chronological().iter().map(|r| r.month).collect();
        assert_eq!(months, vec![1, 6, 12]);
    }

    #[test]
    fn test_error_is_undefined_for_zero_actual() {
        assert!(MonthlyComparisonRecord::new(1, 0.0, 0.0).error.is_nan());
        assert!(MonthlyComparisonRecord::new(1, 5.0, 0.0).error.is_infinite());
        assert_eq!(MonthlyComparisonRecord::new(1, 90.0, 100.0).error, 0.1);
    }

    #[test]
    fn test_month_from_f64() {
        assert_eq!(month_from_f64(7.0).unwrap(), 7);
        assert!(month_from_f64(0.0).is_err());
        assert!(month_from_f64(13.0).is_err());
        assert!(month_from_f64(2.5).is_err());
        assert!(month_from_f64(f64::NAN).is_err());
    }
}
