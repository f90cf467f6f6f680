// src/utils.rs

use anyhow::{Context, Result};
use std::{io::Write, path::Path};
use tempfile::NamedTempFile;

/// Round to two decimals, leaving NaN and infinities untouched.
pub fn round2(v: f64) -> f64 {
    round_to(v, 2)
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}

/// Write `bytes` to a temporary file next to `path`, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("writing temporary file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming temporary file to {}", path.display()))?;
    Ok(())
}
