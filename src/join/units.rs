// src/join/units.rs

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static ENERGY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(-?[0-9][0-9, ]*(?:\.[0-9]+)?)\s*(mwh|kwh|wh)?\s*$")
        .expect("energy regex is valid")
});

/// Parse a metering export energy cell such as `1,234.5kWh` or `1.2 MWh` into kWh.
///
/// Thousands separators are dropped. A bare number is taken to be kWh already.
/// Specific yields (`kWh/kW`) are not energy and are rejected.
pub fn parse_energy_kwh(raw: &str) -> Result<f64> {
    let cleaned = raw.trim().trim_matches('"');
    let caps = ENERGY_RE
        .captures(cleaned)
        .ok_or_else(|| anyhow!("`{}` is not an energy value", raw))?;

    let number: String = caps[1].chars().filter(|c| *c != ',' && *c != ' ').collect();
    let value: f64 = number
        .parse()
        .map_err(|_| anyhow!("`{}` is not an energy value", raw))?;

    let kwh = match caps.get(2).map(|m| m.as_str().to_lowercase()).as_deref() {
        Some("mwh") => value * 1000.0,
        Some("wh") => value / 1000.0,
        _ => value,
    };
    Ok(kwh)
}
