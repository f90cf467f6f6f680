// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::batch::{BatchOptions, FailurePolicy};

pub const CONFIG_ENV: &str = "PVCOMPARE_CONFIG";
pub const INPUT_ROOT_ENV: &str = "PVCOMPARE_INPUT_ROOT";
pub const FAILURE_POLICY_ENV: &str = "PVCOMPARE_FAILURE_POLICY";
pub const PARALLEL_ENV: &str = "PVCOMPARE_PARALLEL";

/// Runtime settings. Layered as defaults, then YAML file, then environment, then CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one sub-directory per PV system.
    pub input_root: PathBuf,
    /// File name prefix of the joined comparison tables.
    pub file_prefix: String,
    /// Directory of raw PVGIS monthly downloads.
    pub pvgis_dir: PathBuf,
    pub failure_policy: FailurePolicy,
    pub parallel: bool,
    /// Where to write the JSON batch report, if anywhere.
    pub report_path: Option<PathBuf>,
    /// Where to write the JSON join report, if anywhere.
    pub join_report_path: Option<PathBuf>,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("output_dir"),
            file_prefix: "joined".into(),
            pvgis_dir: PathBuf::from("pvgis_data"),
            failure_policy: FailurePolicy::Continue,
            parallel: false,
            report_path: None,
            join_report_path: None,
            log_filter: "info".into(),
        }
    }
}

impl Config {
    /// Load from `path`, or from `$PVCOMPARE_CONFIG`, or fall back to defaults;
    /// environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let base = match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::from_yaml_file(&p)?,
            None => Self::default(),
        };
        base.with_overrides(|key| env::var(key).ok())
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `PVCOMPARE_*` overrides using `lookup` to read variables.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(INPUT_ROOT_ENV) {
            self.input_root = PathBuf::from(root);
        }
        if let Some(policy) = lookup(FAILURE_POLICY_ENV) {
            self.failure_policy = policy
                .parse()
                .with_context(|| format!("invalid {}", FAILURE_POLICY_ENV))?;
        }
        if let Some(parallel) = lookup(PARALLEL_ENV) {
            self.parallel = matches!(
                parallel.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(self)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            policy: self.failure_policy,
            parallel: self.parallel,
        }
    }
}
