// src/stats/mod.rs

pub mod metrics;
pub mod summary;

pub use summary::{summary_path, write_summary, StatisticsSummary, SUMMARY_FILE_NAME};

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::table::{read_comparison_table, ComparisonTable};

/// Compute every accuracy metric for `table`.
///
/// MASE scales by first differences of `actual` in row order, not month order.
pub fn calculate_stats(table: &ComparisonTable) -> StatisticsSummary {
    let actual = table.actual();
    let predicted = table.predicted();

    let mean_actual = metrics::mean(&actual);
    let mean_predicted = metrics::mean(&predicted);
    let rmse = metrics::rmse(&actual, &predicted);

    StatisticsSummary {
        mean_actual,
        mean_predicted,
        mae: metrics::mae(&actual, &predicted),
        rmse,
        smape: metrics::smape(&actual, &predicted),
        mape: metrics::mape(&actual, &predicted),
        mase: metrics::mase(&actual, &predicted),
        pearson: metrics::pearson(&actual, &predicted),
        rrmse: rmse / mean_actual,
        cv_actual: metrics::sample_std(&actual) / mean_actual,
        cv_predicted: metrics::sample_std(&predicted) / mean_predicted,
    }
}

/// Result of running the calculator over one input file.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub summary: StatisticsSummary,
}

/// Read `input`, compute its statistics and write them to the sibling `stats.csv`.
///
/// Malformed tables fail with a [`crate::table::TableError`] somewhere in the error chain.
#[tracing::instrument(level = "info", skip(input), fields(path = %input.display()))]
pub fn process_file(input: &Path) -> Result<ProcessedFile> {
    let table = read_comparison_table(input)?;
    debug!(rows = table.len(), "loaded comparison table");

    let summary = calculate_stats(&table);
    let undefined = summary.undefined_metrics();
    if !undefined.is_empty() {
        warn!(metrics = ?undefined, "undefined metrics in summary");
    }

    let output = summary_path(input);
    write_summary(&summary, &output)?;
    info!(output = %output.display(), mae = summary.mae, rmse = summary.rmse, "wrote statistics");

    Ok(ProcessedFile {
        input: input.to_path_buf(),
        output,
        summary,
    })
}
