//! Day partition keys and on-disk layout.
//!
//! Each category/day pair lives in its own CSV file, grouped by year and
//! month:
//!
//! ```text
//! <root>/
//!   2015/
//!     01/
//!       sample_2015_01_02.csv
//!       sample_2015_01_03.csv
//!       other_2015_01_02.csv
//!   2021/
//!     06/
//!       sample_2021_06_03.csv
//! ```
//!
//! Path computation is pure; directory creation is left to the caller so
//! that the logger controls when I/O happens.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::error::{IoOp, LoggerError, Result};

/// File extension for partition files.
pub const PARTITION_EXTENSION: &str = "csv";

// ---------------------------------------------------------------------------
// PartitionKey
// ---------------------------------------------------------------------------

/// Calendar day identifying one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl PartitionKey {
    /// Key for the calendar day of any date-like value (`NaiveDateTime`,
    /// `NaiveDate`, `DateTime<Tz>`, ...).
    #[must_use]
    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// The key as a `NaiveDate`, if it names a real calendar day.
    #[must_use]
    pub fn date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// `<YYYY>/<MM>` relative to the logger root.
    #[must_use]
    pub fn relative_dir(self) -> PathBuf {
        PathBuf::from(format!("{:04}", self.year)).join(format!("{:02}", self.month))
    }

    /// `<category>_<YYYY>_<MM>_<DD>.csv`
    #[must_use]
    pub fn filename(self, category: &str) -> String {
        format!(
            "{category}_{:04}_{:02}_{:02}.{PARTITION_EXTENSION}",
            self.year, self.month, self.day
        )
    }

    /// Parse a partition filename written by [`filename`](Self::filename).
    ///
    /// Returns `None` for files of another category or any other name.
    /// The category may itself contain underscores; only the trailing
    /// `_YYYY_MM_DD.csv` is interpreted.
    #[must_use]
    pub fn parse_filename(category: &str, name: &str) -> Option<Self> {
        let stem = name.strip_suffix(PARTITION_EXTENSION)?.strip_suffix('.')?;
        let rest = stem.strip_prefix(category)?.strip_prefix('_')?;

        let mut parts = rest.split('_');
        let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || y.len() != 4 || m.len() != 2 || d.len() != 2 {
            return None;
        }

        let key = Self {
            year: y.parse().ok()?,
            month: m.parse().ok()?,
            day: d.parse().ok()?,
        };
        key.date().map(|_| key)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Directory holding every partition of `key`'s month.
#[must_use]
pub fn partition_dir(root: &Path, key: PartitionKey) -> PathBuf {
    root.join(key.relative_dir())
}

/// Full path of the partition file for `category` on `key`'s day.
#[must_use]
pub fn partition_file(root: &Path, category: &str, key: PartitionKey) -> PathBuf {
    partition_dir(root, key).join(key.filename(category))
}

/// List every day that has a partition file for `category` under `root`,
/// in chronological order.
///
/// Entries that do not match the `YYYY/MM/<category>_YYYY_MM_DD.csv` layout
/// are silently skipped, as is a missing root.
///
/// # Errors
///
/// Returns [`LoggerError::Io`] if a directory exists but cannot be read.
pub fn list_partitions(root: &Path, category: &str) -> Result<Vec<PartitionKey>> {
    let mut keys = Vec::new();
    for year_dir in numeric_subdirs(root, 4)? {
        for month_dir in numeric_subdirs(&year_dir, 2)? {
            let entries =
                fs::read_dir(&month_dir).map_err(|e| LoggerError::io(IoOp::Read, &month_dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| LoggerError::io(IoOp::Read, &month_dir, e))?;
                let name = entry.file_name();
                if let Some(key) = PartitionKey::parse_filename(category, &name.to_string_lossy())
                {
                    keys.push(key);
                }
            }
        }
    }
    keys.sort_unstable();
    Ok(keys)
}

/// Subdirectories of `dir` whose names are exactly `width` ASCII digits.
fn numeric_subdirs(dir: &Path, width: usize) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| LoggerError::io(IoOp::Read, dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| LoggerError::io(IoOp::Read, dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.len() == width && name.bytes().all(|b| b.is_ascii_digit()) && entry.path().is_dir()
        {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}
