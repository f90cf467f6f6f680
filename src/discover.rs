// src/discover.rs

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Recursively find `<prefix>*.csv` files below `root`, sorted by path.
pub fn find_input_files(root: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!(
            "input root `{}` does not exist or is not a directory",
            root.display()
        );
    }

    let pattern = format!(
        "{}/**/{}*.csv",
        Pattern::escape(&root.to_string_lossy()),
        Pattern::escape(prefix)
    );
    debug!(pattern = %pattern, "scanning for input files");

    let mut found = Vec::new();
    for entry in glob(&pattern).with_context(|| format!("invalid glob pattern `{}`", pattern))? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("cannot read glob entry: {}", e);
                continue;
            }
        };
        if path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
