// src/join/overview.rs

use serde::Serialize;

/// Spread of the per-system mean errors across one join run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorOverview {
    /// Ascending.
    pub sorted: Vec<f64>,
    pub mean: f64,
    /// Upper median: `sorted[len / 2]`.
    pub median: f64,
}

impl ErrorOverview {
    /// `None` when there are no errors to summarize.
    pub fn from_errors(errors: &[f64]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let mut sorted = errors.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        let median = sorted[sorted.len() / 2];
        Some(Self {
            sorted,
            mean,
            median,
        })
    }
}
