// src/table/error.rs

use thiserror::Error;

/// Failures while loading a comparison table.
///
/// Every variant except `Csv` means the file exists and was readable but does
/// not have the shape of a comparison table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("expected 3 or 4 series after transposition, found {found}")]
    Shape { found: usize },

    #[error("series `{label}` has {found} cells, header has {expected}")]
    RaggedRow {
        label: String,
        expected: usize,
        found: usize,
    },

    #[error("series `{series}` column {column}: `{value}` is not a number")]
    NonNumeric {
        series: String,
        column: usize,
        value: String,
    },

    #[error("month value {0} is not an integer in 1..=12")]
    InvalidMonth(f64),

    #[error("month {0} appears more than once")]
    DuplicateMonth(u8),

    #[error("table has no monthly rows")]
    Empty,
}

impl TableError {
    /// True for structural problems with the input, false for I/O or CSV syntax failures.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, TableError::Csv(_))
    }
}
