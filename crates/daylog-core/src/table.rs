//! CSV codec for a single day partition.
//!
//! # Format
//!
//! ```text
//! DateTime,A,B,C
//! 2015-01-02 03:04:05,1,2,3
//! 2015-01-02 04:05:06,3,6,9
//! ```
//!
//! - The first column is the row key. Its header cell is always written as
//!   `DateTime`; on read any name is accepted.
//! - Remaining columns are `f64` values. An empty cell is a missing value
//!   (NaN) and NaN is written back as an empty cell.
//! - Row order is insertion order; nothing is sorted.
//!
//! Writes go to a sibling `*.csv.tmp` file that is renamed over the target,
//! so a failed write leaves the previous file intact.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

use crate::error::{IoOp, LoggerError, Result};
use crate::row::Row;

/// Header cell of the row-key column.
pub const INDEX_COLUMN: &str = "DateTime";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Contents of one partition file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayTable {
    /// Value column names, excluding the `DateTime` index.
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Read and parse a partition file.
///
/// An empty or header-only file yields a table with no rows.
///
/// # Errors
///
/// Returns [`LoggerError::Io`] if the file cannot be read and
/// [`LoggerError::Parse`] if a record, timestamp or value is malformed.
pub fn read_day_file(path: &Path) -> Result<DayTable> {
    let bytes = fs::read(path).map_err(|e| LoggerError::io(IoOp::Read, path, e))?;
    parse_day_table(path, &bytes)
}

/// Parse partition file contents. `path` is only used for error reporting.
///
/// # Errors
///
/// Returns [`LoggerError::Parse`] on malformed content.
pub fn parse_day_table(path: &Path, bytes: &[u8]) -> Result<DayTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let header = reader
        .headers()
        .map_err(|e| csv_parse_error(path, &e))?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_parse_error(path, &e))?;
        rows.push(parse_record(path, &record)?);
    }

    Ok(DayTable { header, rows })
}

fn parse_record(path: &Path, record: &StringRecord) -> Result<Row> {
    let line = record.position().map(csv::Position::line);

    let mut fields = record.iter();
    let raw_ts = fields
        .next()
        .ok_or_else(|| LoggerError::parse(path, line, "record has no DateTime field"))?;
    let timestamp = parse_timestamp(raw_ts)
        .ok_or_else(|| LoggerError::parse(path, line, format!("invalid timestamp '{raw_ts}'")))?;

    let values = fields
        .enumerate()
        .map(|(idx, raw)| {
            parse_value(raw).ok_or_else(|| {
                LoggerError::parse(
                    path,
                    line,
                    format!("invalid number '{raw}' in column {}", idx + 1),
                )
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(Row::new(timestamp, values))
}

/// Parse a `DateTime` cell. Accepts a space or `T` separator with optional
/// fractional seconds, or a bare date (midnight).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_value(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        Some(f64::NAN)
    } else {
        raw.parse().ok()
    }
}

fn csv_parse_error(path: &Path, err: &csv::Error) -> LoggerError {
    let line = err.position().map(csv::Position::line);
    LoggerError::parse(path, line, err.to_string())
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Format a timestamp the way partition files store it. Fractional seconds
/// are only written when present.
#[must_use]
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Positional column names (`0`, `1`, ...) for files written without
/// declared columns.
#[must_use]
pub fn positional_header(width: usize) -> Vec<String> {
    (0..width).map(|i| i.to_string()).collect()
}

/// Temporary sibling used while rewriting `path`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Rewrite the partition file at `path` with `header` and `rows`.
///
/// Rows shorter than `header` are written with empty (missing) trailing
/// cells. The content is written to [`temp_path`] first and renamed into place.
/// With `durable`, the temp file is fsynced before the rename.
///
/// # Errors
///
/// Returns [`LoggerError::Io`] if the temp file cannot be written or
/// renamed. The target file is untouched in that case.
pub fn write_day_file(path: &Path, header: &[String], rows: &[Row], durable: bool) -> Result<()> {
    let tmp = temp_path(path);
    let result = write_temp(&tmp, header, rows, durable).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| LoggerError::io(IoOp::Rename, path, e))
    });

    if result.is_err() && tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), "failed to remove temp partition file: {e}");
        }
    }
    result
}

fn write_temp(tmp: &Path, header: &[String], rows: &[Row], durable: bool) -> Result<()> {
    let write_err = |e: io::Error| LoggerError::io(IoOp::Write, tmp, e);

    let file = File::create(tmp).map_err(write_err)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer
        .write_record(std::iter::once(INDEX_COLUMN).chain(header.iter().map(String::as_str)))
        .map_err(|e| write_err(e.into()))?;

    let mut record = Vec::with_capacity(header.len() + 1);
    for row in rows {
        record.clear();
        record.push(format_timestamp(&row.timestamp));
        record.extend(row.values.iter().map(|&v| format_value(v)));
        // Rows narrower than the header are padded with missing cells.
        record.resize(record.len().max(header.len() + 1), String::new());
        writer
            .write_record(&record)
            .map_err(|e| write_err(e.into()))?;
    }

    let file = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
    if durable {
        file.sync_all().map_err(write_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).expect("timestamp")
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("valid");
        assert_eq!(parse_timestamp("2015-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2015-01-02T03:04:05"), Some(expected));
        assert_eq!(
            parse_timestamp("2015-01-02 03:04:05.250"),
            NaiveDate::from_ymd_opt(2015, 1, 2).and_then(|d| d.and_hms_milli_opt(3, 4, 5, 250))
        );
        assert_eq!(
            parse_timestamp("2015-01-02"),
            NaiveDate::from_ymd_opt(2015, 1, 2).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2015-13-02 00:00:00"), None);
    }

    #[test]
    fn format_timestamp_omits_zero_fraction() {
        assert_eq!(
            format_timestamp(&ts("2015-01-02 03:04:05")),
            "2015-01-02 03:04:05"
        );
        assert_eq!(
            format_timestamp(&ts("2015-01-02 03:04:05.5")),
            "2015-01-02 03:04:05.500"
        );
    }

    #[test]
    fn temp_path_is_sibling() {
        let p = Path::new("/data/2015/01/sample_2015_01_02.csv");
        assert_eq!(
            temp_path(p),
            PathBuf::from("/data/2015/01/sample_2015_01_02.csv.tmp")
        );
    }

    #[test]
    fn parse_pandas_style_file() {
        let content = b"DateTime,0,1,2\n2021-06-03 00:00:00,0.1,0.2,0.3\n2021-06-03 01:00:00,0.7,0.8,0.9\n";
        let table = parse_day_table(Path::new("x.csv"), content).expect("parse");
        assert_eq!(table.header, header(&["0", "1", "2"]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].values, vec![0.7, 0.8, 0.9]);
        assert_eq!(table.rows[1].timestamp, ts("2021-06-03 01:00:00"));
    }

    #[test]
    fn parse_empty_and_header_only() {
        let empty = parse_day_table(Path::new("x.csv"), b"").expect("empty");
        assert!(empty.header.is_empty());
        assert!(empty.rows.is_empty());

        let header_only = parse_day_table(Path::new("x.csv"), b"DateTime,A\n").expect("header");
        assert_eq!(header_only.header, header(&["A"]));
        assert!(header_only.rows.is_empty());
    }

    #[test]
    fn parse_empty_cell_is_missing() {
        let table =
            parse_day_table(Path::new("x.csv"), b"DateTime,A,B\n2015-01-02 00:00:00,,2\n")
                .expect("parse");
        assert!(table.rows[0].values[0].is_nan());
        assert_eq!(table.rows[0].values[1], 2.0);
    }

    #[test]
    fn parse_bad_number_reports_line() {
        let err = parse_day_table(
            Path::new("x.csv"),
            b"DateTime,A\n2015-01-02 00:00:00,1\n2015-01-02 01:00:00,abc\n",
        )
        .expect_err("bad number");
        match err {
            LoggerError::Parse { line, message, .. } => {
                assert_eq!(line, Some(3));
                assert!(message.contains("abc"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn parse_bad_timestamp() {
        let err = parse_day_table(Path::new("x.csv"), b"DateTime,A\nnot-a-date,1\n")
            .expect_err("bad timestamp");
        assert!(matches!(err, LoggerError::Parse { line: Some(2), .. }));
    }

    #[test]
    fn parse_ragged_record_is_rejected() {
        let err = parse_day_table(
            Path::new("x.csv"),
            b"DateTime,A,B\n2015-01-02 00:00:00,1\n",
        )
        .expect_err("ragged");
        assert!(matches!(err, LoggerError::Parse { .. }));
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = read_day_file(&tmp.path().join("absent.csv")).expect_err("missing");
        assert!(matches!(
            err,
            LoggerError::Io {
                op: IoOp::Read,
                ..
            }
        ));
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("sample_2015_01_02.csv");
        let rows = vec![
            Row::new(ts("2015-01-02 04:05:06"), vec![3.0, f64::NAN, 0.1]),
            Row::new(ts("2015-01-02 03:04:05.125"), vec![1.0, 2.0, -1e-9]),
        ];

        write_day_file(&path, &header(&["A", "B", "C"]), &rows, false).expect("write");

        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(
            content,
            "DateTime,A,B,C\n2015-01-02 04:05:06,3,,0.1\n2015-01-02 03:04:05.125,1,2,-0.000000001\n"
        );
        assert!(!temp_path(&path).exists());

        let table = read_day_file(&path).expect("read back");
        assert_eq!(table.header, header(&["A", "B", "C"]));
        assert_eq!(table.rows[0].timestamp, rows[0].timestamp);
        assert!(table.rows[0].values[1].is_nan());
        assert_eq!(table.rows[1], rows[1]);
    }

    #[test]
    fn short_rows_are_padded_with_missing_cells() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("day.csv");
        let rows = vec![
            Row::new(ts("2015-01-02 00:00:00"), vec![1.0, 2.0]),
            Row::new(ts("2015-01-02 01:00:00"), vec![1.0, 2.0, 3.0]),
        ];

        write_day_file(&path, &header(&["A", "B", "C"]), &rows, false).expect("write");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "DateTime,A,B,C\n2015-01-02 00:00:00,1,2,\n2015-01-02 01:00:00,1,2,3\n"
        );

        let table = read_day_file(&path).expect("read back");
        assert!(table.rows[0].values[2].is_nan());
        assert_eq!(table.rows[1].values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn write_replaces_existing_content() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("day.csv");
        fs::write(&path, "garbage that is much longer than the new content\n").expect("seed");

        write_day_file(&path, &positional_header(1), &[], true).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "DateTime,0\n");
    }

    #[test]
    fn failed_write_leaves_target_untouched() {
        let tmp = TempDir::new().expect("tempdir");
        let missing_dir = tmp.path().join("absent");
        let path = missing_dir.join("day.csv");

        let err = write_day_file(&path, &header(&["A"]), &[], false).expect_err("no dir");
        assert!(matches!(
            err,
            LoggerError::Io {
                op: IoOp::Write,
                ..
            }
        ));
        assert!(!path.exists());
    }
}
