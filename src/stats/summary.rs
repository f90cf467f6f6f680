// src/stats/summary.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::utils::write_atomic;

pub const SUMMARY_FILE_NAME: &str = "stats.csv";

/// Column headers of the summary file, label column first.
pub const SUMMARY_HEADERS: [&str; 12] = [
    "Statistics",
    "Mean Actual",
    "Mean Predicted",
    "MAE",
    "RMSE",
    "SMAPE",
    "MAPE",
    "MASE",
    "Pearson Correlation Coefficient",
    "rrmse",
    "cv actual",
    "cv predicted",
];

const SUMMARY_LABEL: &str = "Value";

/// Accuracy metrics of one comparison table. Undefined metrics are NaN or infinite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub mean_actual: f64,
    pub mean_predicted: f64,
    pub mae: f64,
    pub rmse: f64,
    pub smape: f64,
    pub mape: f64,
    pub mase: f64,
    pub pearson: f64,
    pub rrmse: f64,
    pub cv_actual: f64,
    pub cv_predicted: f64,
}

impl StatisticsSummary {
    /// Metric values in header order.
    pub fn values(&self) -> [f64; 11] {
        [
            self.mean_actual,
            self.mean_predicted,
            self.mae,
            self.rmse,
            self.smape,
            self.mape,
            self.mase,
            self.pearson,
            self.rrmse,
            self.cv_actual,
            self.cv_predicted,
        ]
    }

    /// Names of the metrics that came out NaN or infinite.
    pub fn undefined_metrics(&self) -> Vec<&'static str> {
        SUMMARY_HEADERS[1..]
            .iter()
            .zip(self.values())
            .filter(|(_, v)| !v.is_finite())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Render the header and the single data row as CSV.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = WriterBuilder::new().from_writer(Vec::new());
        wtr.write_record(SUMMARY_HEADERS)?;

        let mut row = Vec::with_capacity(SUMMARY_HEADERS.len());
        row.push(SUMMARY_LABEL.to_string());
        row.extend(self.values().iter().map(|v| v.to_string()));
        wtr.write_record(&row)?;

        wtr.into_inner()
            .map_err(|e| e.into_error())
            .context("flushing statistics summary")
    }
}

/// `stats.csv` in the same directory as `input`.
pub fn summary_path(input: &Path) -> PathBuf {
    match input.parent() {
        Some(dir) => dir.join(SUMMARY_FILE_NAME),
        None => PathBuf::from(SUMMARY_FILE_NAME),
    }
}

/// Write `summary` to `path`, replacing any previous result.
pub fn write_summary(summary: &StatisticsSummary, path: &Path) -> Result<()> {
    let bytes = summary.to_csv_bytes()?;
    write_atomic(path, &bytes)
        .with_context(|| format!("writing statistics summary {}", path.display()))
}
