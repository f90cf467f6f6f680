// src/table/read.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};
use tracing::debug;

use super::{month_from_f64, relative_error, ComparisonTable, MonthlyComparisonRecord, TableError};
use crate::utils::{round2, write_atomic};

pub const MONTH_LABEL: &str = "Month";
pub const PREDICTED_LABEL: &str = "PVGIS Generated";
pub const ACTUAL_LABEL: &str = "PVOUTPUT Generated";
pub const ERROR_LABEL: &str = "Error";

/// Load a joined comparison file.
///
/// The file is stored transposed: a header row of column indices, then one row per
/// series (month, predicted, actual and optionally error), each led by a label cell.
/// Series are matched by position; the labels are not interpreted.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_comparison_table<P: AsRef<Path>>(path: P) -> Result<ComparisonTable, TableError> {
    let file = File::open(path.as_ref()).map_err(csv::Error::from)?;
    parse_comparison_table(BufReader::new(file))
}

/// Same as [`read_comparison_table`] over any reader.
pub fn parse_comparison_table<R: Read>(reader: R) -> Result<ComparisonTable, TableError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = rdr.records();
    let width = match rows.next() {
        Some(header) => header?.len(),
        None => return Err(TableError::Empty),
    };

    let mut series: Vec<(String, Vec<Option<f64>>)> = Vec::with_capacity(4);
    for result in rows {
        let record = result?;
        let label = record.get(0).unwrap_or_default().to_string();
        if record.len() != width {
            return Err(TableError::RaggedRow {
                label,
                expected: width,
                found: record.len(),
            });
        }

        let mut values = Vec::with_capacity(width.saturating_sub(1));
        for (column, cell) in record.iter().enumerate().skip(1) {
            let cell = cell.trim_matches('"');
            if cell.is_empty() {
                values.push(None);
                continue;
            }
            let value = cell.parse::<f64>().map_err(|_| TableError::NonNumeric {
                series: label.clone(),
                column,
                value: cell.to_string(),
            })?;
            values.push(Some(value));
        }
        series.push((label, values));
    }

    if !(3..=4).contains(&series.len()) {
        return Err(TableError::Shape {
            found: series.len(),
        });
    }
    debug!(series = series.len(), columns = width - 1, "transposed table");

    let n = series[0].1.len();
    if n == 0 {
        return Err(TableError::Empty);
    }

    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let month = required(&series[0], i)?;
        let predicted = required(&series[1], i)?;
        let actual = required(&series[2], i)?;
        // the error series is derived, so blanks (written for 0/0) are recomputed
        let error = series
            .get(3)
            .and_then(|(_, values)| values[i])
            .unwrap_or_else(|| relative_error(predicted, actual));

        records.push(MonthlyComparisonRecord {
            month: month_from_f64(month)?,
            predicted,
            actual,
            error,
        });
    }

    ComparisonTable::from_records(records)
}

fn required(series: &(String, Vec<Option<f64>>), i: usize) -> Result<f64, TableError> {
    series.1[i].ok_or_else(|| TableError::NonNumeric {
        series: series.0.clone(),
        column: i + 1,
        value: String::new(),
    })
}

/// Write `table` in the transposed layout read by [`read_comparison_table`].
/// Values are rounded to two decimals; any existing file is replaced.
pub fn write_comparison_table<P: AsRef<Path>>(table: &ComparisonTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());

    let mut header = vec![String::new()];
    header.extend((0..table.len()).map(|i| i.to_string()));
    wtr.write_record(&header)?;

    let rows: [(&str, fn(&MonthlyComparisonRecord) -> String); 4] = [
        (MONTH_LABEL, |r: &MonthlyComparisonRecord| r.month.to_string()),
        (PREDICTED_LABEL, |r: &MonthlyComparisonRecord| {
            round2(r.predicted).to_string()
        }),
        (ACTUAL_LABEL, |r: &MonthlyComparisonRecord| round2(r.actual).to_string()),
        (ERROR_LABEL, |r: &MonthlyComparisonRecord| round2(r.error).to_string()),
    ];
    for (label, cell) in rows {
        let mut record = vec![label.to_string()];
        record.extend(table.records().iter().map(cell));
        wtr.write_record(&record)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flushing comparison table")?;
    write_atomic(path, &bytes)
        .with_context(|| format!("writing comparison table {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    const JOINED: &str = ",0,1,2\n\
Month,1.0,2.0,3.0\n\
PVGIS Generated,100.5,120.0,150.25\n\
PVOUTPUT Generated,110.0,115.0,160.0\n\
Error,0.09,-0.04,0.06\n";

    #[test]
    fn test_parse_transposed_table() {
        let table = parse_comparison_table(Cursor::new(JOINED)).unwrap();
        assert_eq!(table.len(), 3);
        let first = table.records()[0];
        assert_eq!(first.month, 1);
        assert_eq!(first.predicted, 100.5);
        assert_eq!(first.actual, 110.0);
        assert_eq!(first.error, 0.09);
    }

    #[test]
    fn test_error_series_is_optional() {
        let content = ",0,1\nMonth,1,2\nP,90,50\nA,100,50\n";
        let table = parse_comparison_table(Cursor::new(content)).unwrap();
        assert_eq!(table.records()[0].error, 0.1);
        assert_eq!(table.records()[1].error, 0.0);
    }

    #[test]
    fn test_blank_error_cell_is_recomputed() {
        let content = ",0,1\nMonth,1,2\nP,0,50\nA,0,50\nError,,0.0\n";
        let table = parse_comparison_table(Cursor::new(content)).unwrap();
        assert!(table.records()[0].error.is_nan());
    }

    #[test]
    fn test_wrong_series_count_is_malformed() {
        let content = ",0,1\nMonth,1,2\nP,90,50\n";
        let err = parse_comparison_table(Cursor::new(content)).unwrap_err();
        assert!(matches!(err, TableError::Shape { found: 2 }));
        assert!(err.is_malformed());

        let content = ",0\nMonth,1\nP,1\nA,1\nE,0\nExtra,5\n";
        let err = parse_comparison_table(Cursor::new(content)).unwrap_err();
        assert!(matches!(err, TableError::Shape { found: 5 }));
    }

    #[test]
    fn test_non_numeric_cell_is_malformed() {
        let content = ",0,1\nMonth,1,2\nP,90,abc\nA,100,50\n";
        let err = parse_comparison_table(Cursor::new(content)).unwrap_err();
        match err {
            TableError::NonNumeric { column, value, .. } => {
                assert_eq!(column, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_actual_cell_is_malformed() {
        let content = ",0,1\nMonth,1,2\nP,90,40\nA,,50\n";
        assert!(matches!(
            parse_comparison_table(Cursor::new(content)),
            Err(TableError::NonNumeric { .. })
        ));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let content = ",0,1\nMonth,1,2\nP,90\nA,100,50\n";
        assert!(matches!(
            parse_comparison_table(Cursor::new(content)),
            Err(TableError::RaggedRow { found: 2, expected: 3, .. })
        ));
    }

    #[test]
    fn test_missing_file_is_not_malformed() {
        let dir = tempdir().unwrap();
        let err = read_comparison_table(dir.path().join("nope.csv")).unwrap_err();
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_written_table_reads_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("joined_x.csv");
        let table = ComparisonTable::from_records(vec![
            MonthlyComparisonRecord::new(2, 100.123, 110.0),
            MonthlyComparisonRecord::new(1, 50.0, 40.0),
        ])?;
        write_comparison_table(&table, &path)?;

        let text = std::fs::read_to_string(&path)?;
        assert!(text.starts_with(",0,1\nMonth,2,1\nPVGIS Generated,100.12,50\n"));

        let back = read_comparison_table(&path)?;
        assert_eq!(back.records()[0].month, 2);
        assert_eq!(back.records()[0].predicted, 100.12);
        assert_eq!(back.records()[1].error, -0.25);
        Ok(())
    }
}
