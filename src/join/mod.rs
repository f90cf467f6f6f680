// src/join/mod.rs

pub mod overview;
pub mod pvgis;
pub mod units;

pub use overview::ErrorOverview;
pub use pvgis::{normalize_pvgis, normalize_pvgis_dir, NormalizeRun, NormalizedPvgis};

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

use crate::batch::FailurePolicy;
use crate::stats::metrics;
use crate::table::{month_from_f64, write_comparison_table, ComparisonTable, MonthlyComparisonRecord};
use crate::utils::{round_to, write_atomic};

pub const PVGIS_MONTH_COLUMN: &str = "Month";
pub const PVGIS_ENERGY_COLUMN: &str = "Avg Monthly Energy Production";
pub const PVOUTPUT_ENERGY_COLUMN: &str = "Generated (KWh)";
pub const PVOUTPUT_RAW_COLUMN: &str = "Generated";

/// Where one system's source files live below the input root.
#[derive(Debug, Clone)]
pub struct SystemSources {
    pub name: String,
    pub dir: PathBuf,
    pub pvgis: PathBuf,
    pub pvoutput: PathBuf,
}

impl SystemSources {
    /// `<root>/<name>/pvgis/<name>.csv` and `<root>/<name>/pvoutput/<name>.csv`.
    pub fn locate(root: &Path, name: &str) -> Self {
        let dir = root.join(name);
        let file = format!("{}.csv", name);
        Self {
            name: name.to_string(),
            pvgis: dir.join("pvgis").join(&file),
            pvoutput: dir.join("pvoutput").join(&file),
            dir,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pvgis.is_file() && self.pvoutput.is_file()
    }

    /// `<root>/<name>/joined_<name>.csv`.
    pub fn joined_path(&self) -> PathBuf {
        self.dir.join(format!("joined_{}.csv", self.name))
    }
}

/// A system whose sources were joined into a comparison table.
#[derive(Debug, Clone, Serialize)]
pub struct JoinedSystem {
    pub name: String,
    pub output: PathBuf,
    #[serde(skip)]
    pub table: ComparisonTable,
    pub mean_predicted: f64,
    pub mean_actual: f64,
    pub std_predicted: f64,
    pub std_actual: f64,
    /// |(mean actual - mean predicted) / mean actual|, rounded to 3 decimals.
    pub mean_error: f64,
}

/// Outcome of joining every system below a root.
#[derive(Debug, Default, Serialize)]
pub struct JoinRun {
    pub joined: Vec<JoinedSystem>,
    /// System name and rendered error.
    pub failed: Vec<(String, String)>,
    /// Directories without both source files.
    pub skipped: Vec<String>,
}

impl JoinRun {
    pub fn overview(&self) -> Option<ErrorOverview> {
        let errors: Vec<f64> = self.joined.iter().map(|s| s.mean_error).collect();
        ErrorOverview::from_errors(&errors)
    }

    /// Pretty-printed JSON of the run and its error overview.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct JoinReport<'a> {
            #[serde(flatten)]
            run: &'a JoinRun,
            overview: Option<ErrorOverview>,
        }

        let mut bytes = serde_json::to_vec_pretty(&JoinReport {
            run: self,
            overview: self.overview(),
        })
        .context("serializing join report")?;
        bytes.push(b'\n');
        write_atomic(path, &bytes).with_context(|| format!("writing join report {}", path.display()))
    }
}

/// Join one system's PVGIS and PVOutput files and write `joined_<name>.csv`.
///
/// Rows are paired by position. Differing row counts are an error.
#[tracing::instrument(level = "info", skip(sources), fields(system = %sources.name))]
pub fn join_system(sources: &SystemSources) -> Result<JoinedSystem> {
    let estimates = read_pvgis(&sources.pvgis)?;
    let metered = read_pvoutput(&sources.pvoutput)?;
    if estimates.len() != metered.len() {
        anyhow::bail!(
            "{} has {} months but {} has {}",
            sources.pvgis.display(),
            estimates.len(),
            sources.pvoutput.display(),
            metered.len()
        );
    }

    let records = estimates
        .iter()
        .zip(&metered)
        .map(|(&(month, predicted), &actual)| {
            MonthlyComparisonRecord::new(month, predicted, actual)
        })
        .collect();
    let table = ComparisonTable::from_records(records)
        .with_context(|| format!("joining {}", sources.name))?;

    let output = sources.joined_path();
    write_comparison_table(&table, &output)?;

    let predicted = table.predicted();
    let actual = table.actual();
    let mean_predicted = metrics::mean(&predicted);
    let mean_actual = metrics::mean(&actual);
    let joined = JoinedSystem {
        name: sources.name.clone(),
        output,
        mean_predicted,
        mean_actual,
        std_predicted: metrics::sample_std(&predicted),
        std_actual: metrics::sample_std(&actual),
        mean_error: round_to(((mean_actual - mean_predicted) / mean_actual).abs(), 3),
        table,
    };
    info!(
        output = %joined.output.display(),
        months = joined.table.len(),
        mean_error = joined.mean_error,
        "joined"
    );
    Ok(joined)
}

/// Join every system directory directly below `root`, in name order.
pub fn join_all(root: &Path, policy: FailurePolicy) -> Result<JoinRun> {
    let mut names = Vec::new();
    for entry in
        fs::read_dir(root).with_context(|| format!("listing input root {}", root.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();

    let mut run = JoinRun::default();
    for name in names {
        let sources = SystemSources::locate(root, &name);
        if !sources.is_complete() {
            warn!(system = %name, "missing pvgis or pvoutput file, skipping");
            run.skipped.push(name);
            continue;
        }
        match join_system(&sources) {
            Ok(joined) => run.joined.push(joined),
            Err(e) if policy == FailurePolicy::Continue => {
                error!(system = %name, "join failed: {:#}", e);
                run.failed.push((name, format!("{:#}", e)));
            }
            Err(e) => return Err(e.context(format!("join failed for {}", name))),
        }
    }
    Ok(run)
}

/// Read `(month, estimated kWh)` pairs from a PVGIS monthly file.
pub fn read_pvgis(path: &Path) -> Result<Vec<(u8, f64)>> {
    let (headers, records) = read_csv(path)?;
    let month_idx = column_index(&headers, PVGIS_MONTH_COLUMN, path)?;
    let energy_idx = column_index(&headers, PVGIS_ENERGY_COLUMN, path)?;

    records
        .iter()
        .enumerate()
        .map(|(row, rec)| -> Result<(u8, f64)> {
            let month = parse_cell(rec, month_idx, path, row)?;
            let month = month_from_f64(month)
                .with_context(|| format!("{} row {}", path.display(), row + 1))?;
            Ok((month, parse_cell(rec, energy_idx, path, row)?))
        })
        .collect()
}

/// Read monthly metered kWh from a PVOutput file, oldest month first.
///
/// Uses the normalized `Generated (KWh)` column when present, taking rows as they are.
/// Otherwise the file is a raw monthly export: newest month first, led by the month
/// still in progress. That row is dropped, the rest reversed, and the `Generated`
/// cells parsed with their unit suffixes.
pub fn read_pvoutput(path: &Path) -> Result<Vec<f64>> {
    let (headers, records) = read_csv(path)?;

    if let Ok(idx) = column_index(&headers, PVOUTPUT_ENERGY_COLUMN, path) {
        return records
            .iter()
            .enumerate()
            .map(|(row, rec)| parse_cell(rec, idx, path, row))
            .collect();
    }

    let idx = column_index(&headers, PVOUTPUT_RAW_COLUMN, path).map_err(|_| {
        anyhow!(
            "{}: neither `{}` nor `{}` column present",
            path.display(),
            PVOUTPUT_ENERGY_COLUMN,
            PVOUTPUT_RAW_COLUMN
        )
    })?;
    records
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .map(|(row, rec)| {
            let cell = rec.get(idx).unwrap_or_default();
            units::parse_energy_kwh(cell)
                .with_context(|| format!("{} row {}", path.display(), row + 1))
        })
        .collect()
}

fn read_csv(path: &Path) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();
    let records = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok((headers, records))
}

fn column_index(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| anyhow!("{}: missing column `{}`", path.display(), name))
}

fn parse_cell(rec: &StringRecord, idx: usize, path: &Path, row: usize) -> Result<f64> {
    let cell = rec.get(idx).unwrap_or_default();
    cell.parse::<f64>().map_err(|_| {
        anyhow!(
            "{} row {}: `{}` is not a number",
            path.display(),
            row + 1,
            cell
        )
    })
}
