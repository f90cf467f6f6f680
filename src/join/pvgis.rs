// src/join/pvgis.rs

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info};

use super::{PVGIS_ENERGY_COLUMN, PVGIS_MONTH_COLUMN};
use crate::batch::FailurePolicy;
use crate::utils::write_atomic;

/// Line of a PVGIS monthly download holding the table header. The month rows follow.
const TABLE_HEADER_LINE: usize = 8;
/// One past the last month row.
const TABLE_END_LINE: usize = 21;

/// Preamble lines whose second field is copied to `info.txt`, in order.
const SITE_INFO_LINES: [usize; 5] = [0, 1, 3, 4, 5];

/// PVGIS column codes and the names the joined pipeline reads.
pub const COLUMN_NAMES: [(&str, &str); 6] = [
    ("SD_m", "Monthly Avg Standard Deviation"),
    ("H(i)_m", "Avg Monthly Sum Of Global Irradiation"),
    ("H(i)_d", "Avg Daily Sum Of Global Irradiation"),
    ("E_m", PVGIS_ENERGY_COLUMN),
    ("E_d", "Avg Daily Energy Production"),
    ("outputs.vertical_axis.month", PVGIS_MONTH_COLUMN),
];

fn long_name(code: &str) -> &str {
    COLUMN_NAMES
        .iter()
        .find(|&&(short, _)| short == code)
        .map_or(code, |&(_, long)| long)
}

/// A download turned into the files `join` reads.
#[derive(Debug, Clone)]
pub struct NormalizedPvgis {
    pub system: String,
    pub csv: PathBuf,
    pub info: PathBuf,
    /// Site parameters from the preamble: coordinates, peak power, losses, angle.
    pub site: Vec<String>,
    pub columns: Vec<String>,
    pub months: usize,
}

#[derive(Debug, Default)]
pub struct NormalizeRun {
    pub normalized: Vec<NormalizedPvgis>,
    /// Download path and rendered error.
    pub failed: Vec<(PathBuf, String)>,
}

/// Normalize one tab-separated PVGIS monthly download.
///
/// The system name is the download's file name up to its first `.`. Writes
/// `<root>/<system>/pvgis/<system>.csv` with long column names and a leading row index,
/// and `<root>/<system>/info.txt` with one site parameter per line. Columns with no
/// values in any month row are dropped.
#[tracing::instrument(level = "info", skip(download, root), fields(path = %download.display()))]
pub fn normalize_pvgis(download: &Path, root: &Path) -> Result<NormalizedPvgis> {
    let system = download
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| anyhow!("{} has no usable file name", download.display()))?
        .to_string();

    let lines = read_tsv(download)?;
    let site = SITE_INFO_LINES
        .iter()
        .map(|&i| {
            lines
                .get(i)
                .and_then(|r| r.get(1))
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{}: preamble line {} has no value", download.display(), i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let end = lines.len().min(TABLE_END_LINE);
    let (header, months) = match lines.get(TABLE_HEADER_LINE..end).and_then(|t| t.split_first()) {
        Some((header, months)) if !months.is_empty() => (header, months),
        _ => bail!("{}: no monthly table after the preamble", download.display()),
    };

    let width = months.iter().map(StringRecord::len).max().unwrap_or(0);
    let kept: Vec<usize> = (0..width)
        .filter(|&j| months.iter().any(|r| !r.get(j).unwrap_or_default().is_empty()))
        .collect();
    let columns: Vec<String> = kept
        .iter()
        .map(|&j| long_name(header.get(j).unwrap_or_default()).to_string())
        .collect();
    for required in [PVGIS_MONTH_COLUMN, PVGIS_ENERGY_COLUMN] {
        if !columns.iter().any(|c| c == required) {
            bail!(
                "{}: monthly table has no `{}` column (found {:?})",
                download.display(),
                required,
                columns
            );
        }
    }

    let rows = months
        .iter()
        .map(|rec| {
            kept.iter()
                .map(|&j| {
                    let cell = rec.get(j).unwrap_or_default();
                    cell.parse::<f64>().map_err(|_| {
                        anyhow!(
                            "{} line {}: `{}` is not a number",
                            download.display(),
                            rec.position().map_or(0, |p| p.line()),
                            cell
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let system_dir = root.join(&system);
    let pvgis_dir = system_dir.join("pvgis");
    fs::create_dir_all(&pvgis_dir)
        .with_context(|| format!("creating {}", pvgis_dir.display()))?;

    let csv = pvgis_dir.join(format!("{}.csv", system));
    write_atomic(&csv, &render_table(&columns, &rows)?)?;
    let info = system_dir.join("info.txt");
    write_atomic(&info, site.join("\n").as_bytes())?;

    info!(output = %csv.display(), months = rows.len(), "normalized pvgis download");
    Ok(NormalizedPvgis {
        system,
        csv,
        info,
        site,
        columns,
        months: rows.len(),
    })
}

/// Normalize every `*.csv` download directly inside `downloads`, in name order.
pub fn normalize_pvgis_dir(
    downloads: &Path,
    root: &Path,
    policy: FailurePolicy,
) -> Result<NormalizeRun> {
    let mut files = Vec::new();
    for entry in fs::read_dir(downloads)
        .with_context(|| format!("listing pvgis downloads {}", downloads.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "csv") {
            files.push(path);
        }
    }
    files.sort();

    let mut run = NormalizeRun::default();
    for path in files {
        match normalize_pvgis(&path, root) {
            Ok(done) => run.normalized.push(done),
            Err(e) if policy == FailurePolicy::Continue => {
                error!(path = %path.display(), "pvgis normalization failed: {:#}", e);
                run.failed.push((path, format!("{:#}", e)));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(run)
}

fn read_tsv(path: &Path) -> Result<Vec<StringRecord>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    rdr.records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing {}", path.display()))
}

fn render_table(columns: &[String], rows: &[Vec<f64>]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    let mut header = vec![String::new()];
    header.extend(columns.iter().cloned());
    wtr.write_record(&header)?;
    for (i, row) in rows.iter().enumerate() {
        let mut cells = vec![i.to_string()];
        cells.extend(row.iter().map(f64::to_string));
        wtr.write_record(&cells)?;
    }
    wtr.into_inner()
        .map_err(|e| e.into_error())
        .context("flushing pvgis table")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::read_pvgis;
    use tempfile::tempdir;

    const DOWNLOAD: &str = "Latitude (decimal degrees):\t52.370\n\
Longitude (decimal degrees):\t4.890\n\
Elevation (m):\t2\n\
Nominal power of the PV system (c-Si) (kWp):\t3.5\n\
System losses (%):\t14.0\n\
Slope angle (deg.):\t35\n\
Radiation database:\tPVGIS-SARAH2\n\
Fixed slope of modules:\t\n\
Month\tE_d\tE_m\tH(i)_d\tH(i)_m\tSD_m\t\t\n\
1\t2.1\t65.1\t0.9\t28.1\t11.2\t\t\n\
2\t3.7\t103.6\t1.5\t42.6\t14.8\t\t\n\
3\t7.4\t229.4\t2.9\t89.9\t22.0\t\t\n\
4\t11.5\t345.0\t4.5\t134.7\t27.1\t\t\n\
5\t13.1\t406.1\t5.2\t161.4\t30.3\t\t\n\
6\t12.9\t387.0\t5.2\t156.9\t25.6\t\t\n\
7\t12.8\t396.8\t5.2\t160.4\t28.5\t\t\n\
8\t11.2\t347.2\t4.5\t139.6\t21.9\t\t\n\
9\t8.6\t258.0\t3.4\t102.8\t19.4\t\t\n\
10\t5.6\t173.6\t2.2\t67.5\t16.3\t\t\n\
11\t2.7\t81.0\t1.0\t31.2\t10.1\t\t\n\
12\t1.7\t52.7\t0.7\t21.4\t9.8\t\t\n\
\n\
Y\t7.8\t2845.5\t3.0\t1136.5\t102.3\n\
E_m: Average monthly electricity production\n";

    #[test]
    fn test_normalize_download() -> Result<()> {
        let tmp = tempdir()?;
        let download = tmp.path().join("amsterdam.pvgis.csv");
        fs::write(&download, DOWNLOAD)?;
        let root = tmp.path().join("output_dir");

        let done = normalize_pvgis(&download, &root)?;
        assert_eq!(done.system, "amsterdam");
        assert_eq!(done.csv, root.join("amsterdam/pvgis/amsterdam.csv"));
        assert_eq!(done.months, 12);
        assert_eq!(
            done.columns,
            vec![
                "Month",
                "Avg Daily Energy Production",
                "Avg Monthly Energy Production",
                "Avg Daily Sum Of Global Irradiation",
                "Avg Monthly Sum Of Global Irradiation",
                "Monthly Avg Standard Deviation",
            ]
        );

        let info = fs::read_to_string(&done.info)?;
        assert_eq!(info, "52.370\n4.890\n3.5\n14.0\n35");

        let text = fs::read_to_string(&done.csv)?;
        assert!(text.starts_with(",Month,Avg Daily Energy Production,"));
        assert_eq!(text.lines().nth(1), Some("0,1,2.1,65.1,0.9,28.1,11.2"));

        let months = read_pvgis(&done.csv)?;
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], (1, 65.1));
        assert_eq!(months[11], (12, 52.7));
        Ok(())
    }

    #[test]
    fn test_flat_json_column_name() -> Result<()> {
        let tmp = tempdir()?;
        let download = tmp.path().join("site.csv");
        let text = DOWNLOAD.replacen("Month\t", "outputs.vertical_axis.month\t", 1);
        fs::write(&download, text)?;

        let done = normalize_pvgis(&download, tmp.path())?;
        assert_eq!(done.columns[0], PVGIS_MONTH_COLUMN);
        Ok(())
    }

    #[test]
    fn test_truncated_download_fails() -> Result<()> {
        let tmp = tempdir()?;
        let download = tmp.path().join("short.csv");
        let text: String = DOWNLOAD.lines().take(8).map(|l| format!("{}\n", l)).collect();
        fs::write(&download, text)?;

        let err = normalize_pvgis(&download, tmp.path()).unwrap_err();
        assert!(err.to_string().contains("no monthly table"));
        assert!(!tmp.path().join("short").exists());
        Ok(())
    }

    #[test]
    fn test_normalize_dir_policies() -> Result<()> {
        let tmp = tempdir()?;
        let downloads = tmp.path().join("pvgis_data");
        fs::create_dir_all(&downloads)?;
        fs::write(downloads.join("a.csv"), DOWNLOAD)?;
        fs::write(downloads.join("b.csv"), DOWNLOAD.replace("65.1", "n/a"))?;
        fs::write(downloads.join("notes.txt"), "ignored")?;
        let root = tmp.path().join("out");

        let run = normalize_pvgis_dir(&downloads, &root, FailurePolicy::Continue)?;
        assert_eq!(run.normalized.len(), 1);
        assert_eq!(run.failed.len(), 1);
        assert!(run.failed[0].1.contains("n/a"));
        assert!(root.join("a/pvgis/a.csv").is_file());

        assert!(normalize_pvgis_dir(&downloads, &root, FailurePolicy::FailFast).is_err());
        Ok(())
    }
}
