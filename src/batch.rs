// src/batch.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{error, info};

use crate::stats::{process_file, StatisticsSummary};
use crate::table::TableError;

/// What a batch does when one input fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the batch on the first failing file.
    FailFast,
    /// Record the failure and keep going.
    #[default]
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            other => anyhow::bail!("unknown failure policy `{}`", other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub policy: FailurePolicy,
    /// Process files on the rayon thread pool.
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Written,
    /// The input did not have the shape of a comparison table.
    Malformed,
    /// I/O or other failure.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub status: FileStatus,
    pub error: Option<String>,
    pub summary: Option<StatisticsSummary>,
}

impl FileOutcome {
    fn from_result(input: &Path, result: Result<crate::stats::ProcessedFile>) -> Self {
        match result {
            Ok(done) => FileOutcome {
                input: done.input,
                output: Some(done.output),
                status: FileStatus::Written,
                error: None,
                summary: Some(done.summary),
            },
            Err(e) => {
                let malformed = e
                    .downcast_ref::<TableError>()
                    .is_some_and(TableError::is_malformed);
                FileOutcome {
                    input: input.to_path_buf(),
                    output: None,
                    status: if malformed {
                        FileStatus::Malformed
                    } else {
                        FileStatus::Failed
                    },
                    error: Some(format!("{:#}", e)),
                    summary: None,
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Written
    }
}

/// Per-file outcomes of one batch run, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub policy: FailurePolicy,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Pretty-printed JSON. Undefined metrics are written as `null`.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating batch report {}", path.display()))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, self).context("serializing batch report")?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }
}

/// Compute statistics for every file in `files`.
///
/// Under [`FailurePolicy::FailFast`] the first failure is returned as the error, naming
/// the file. Under [`FailurePolicy::Continue`] every file is attempted and failures are
/// recorded in the report.
pub fn run_batch(files: &[PathBuf], opts: &BatchOptions) -> Result<BatchReport> {
    let started_at = Utc::now();
    info!(files = files.len(), policy = ?opts.policy, parallel = opts.parallel, "starting batch");

    let outcomes = match opts.policy {
        FailurePolicy::FailFast => {
            let run = |path: &PathBuf| {
                process_file(path)
                    .with_context(|| format!("statistics failed for {}", path.display()))
                    .map(|done| FileOutcome::from_result(path, Ok(done)))
            };
            if opts.parallel {
                files.par_iter().map(run).collect::<Result<Vec<_>>>()?
            } else {
                files.iter().map(run).collect::<Result<Vec<_>>>()?
            }
        }
        FailurePolicy::Continue => {
            let run = |path: &PathBuf| {
                let outcome = FileOutcome::from_result(path, process_file(path));
                if let Some(err) = &outcome.error {
                    error!(path = %path.display(), "statistics failed: {}", err);
                }
                outcome
            };
            if opts.parallel {
                files.par_iter().map(run).collect()
            } else {
                files.iter().map(run).collect()
            }
        }
    };

    let report = BatchReport {
        started_at,
        finished_at: Utc::now(),
        policy: opts.policy,
        outcomes,
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const GOOD: &str = ",0,1,2\nMonth,1,2,3\nPVGIS Generated,10,20,35\nPVOUTPUT Generated,12,18,30\n";
    const BAD: &str = ",0,1\nMonth,1,2\nPVGIS Generated,oops,1\nPVOUTPUT Generated,1,1\n";

    fn fixture() -> Result<(tempfile::TempDir, Vec<PathBuf>)> {
        let tmp = tempdir()?;
        let mut files = Vec::new();
        for (site, body) in [("a", GOOD), ("b", BAD), ("c", GOOD)] {
            let dir = tmp.path().join(site);
            fs::create_dir_all(&dir)?;
            let path = dir.join(format!("joined_{site}.csv"));
            fs::write(&path, body)?;
            files.push(path);
        }
        Ok((tmp, files))
    }

    #[test]
    fn test_continue_isolates_failures() -> Result<()> {
        let (tmp, files) = fixture()?;
        let report = run_batch(&files, &BatchOptions::default())?;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.outcomes[1].status, FileStatus::Malformed);
        assert!(report.outcomes[1].error.as_deref().unwrap().contains("oops"));
        assert!(tmp.path().join("a/stats.csv").exists());
        assert!(!tmp.path().join("b/stats.csv").exists());
        assert!(tmp.path().join("c/stats.csv").exists());
        assert!(report.has_failures());
        Ok(())
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() -> Result<()> {
        let (tmp, files) = fixture()?;
        let opts = BatchOptions {
            policy: FailurePolicy::FailFast,
            parallel: false,
        };
        let err = run_batch(&files, &opts).unwrap_err();
        assert!(format!("{:#}", err).contains("joined_b.csv"));
        assert!(tmp.path().join("a/stats.csv").exists());
        assert!(!tmp.path().join("c/stats.csv").exists());
        Ok(())
    }

    #[test]
    fn test_parallel_keeps_input_order() -> Result<()> {
        let (_tmp, files) = fixture()?;
        let opts = BatchOptions {
            policy: FailurePolicy::Continue,
            parallel: true,
        };
        let report = run_batch(&files, &opts)?;
        let inputs: Vec<&PathBuf> = report.outcomes.iter().map(|o| &o.input).collect();
        assert_eq!(inputs, files.iter().collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_report_json() -> Result<()> {
        let (tmp, files) = fixture()?;
        let report = run_batch(&files[..1], &BatchOptions::default())?;
        let path = tmp.path().join("report.json");
        report.write_json(&path)?;

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(value["policy"], "continue");
        assert_eq!(value["outcomes"][0]["status"], "written");
        assert!(value["outcomes"][0]["summary"]["mae"].is_number());
        Ok(())
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("fail-fast".parse::<FailurePolicy>().unwrap(), FailurePolicy::FailFast);
        assert_eq!("Continue".parse::<FailurePolicy>().unwrap(), FailurePolicy::Continue);
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }
}
