//! The day-partitioned logger.
//!
//! A [`PartitionedLogger`] appends rows for one category to per-day CSV
//! files under `<root>/<YYYY>/<MM>/` and answers per-day column aggregates.
//!
//! # Resident partition
//!
//! Exactly one day is held in memory at a time. Touching a timestamp on
//! another day evicts the resident day and lazily loads the new one from
//! disk (an absent file is simply an empty day). What eviction does with
//! unflushed rows is governed by [`EvictionPolicy`]:
//!
//! - [`EvictionPolicy::Discard`]: rows appended since the last flush are
//!   dropped. The file on disk keeps whatever was last flushed, and a later
//!   query for that day reloads exactly that.
//! - [`EvictionPolicy::FlushFirst`]: the resident day is flushed before the
//!   switch.
//!
//! With `auto_flush` every append is flushed immediately and both policies
//! behave the same.
//!
//! # Invariants
//!
//! - A flush rewrites the whole file from the resident rows (temp file +
//!   rename), never appends to it.
//! - A failed flush leaves the partition dirty so the caller can retry.
//! - Declared column names are never replaced by anything read from disk.
//! - Rows keep insertion order; duplicate or out-of-order timestamps are
//!   accepted as given.
//! - A partition file that fails to parse is never loaded, so it cannot be
//!   overwritten by a later flush.

use std::collections::HashMap;
use std::fs;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::config::{EvictionPolicy, LoggerConfig};
use crate::error::{IoOp, LoggerError, Result};
use crate::partition::{self, PartitionKey};
use crate::row::Row;
use crate::stats::{self, DailySummary};
use crate::table::{self, DayTable};

// ---------------------------------------------------------------------------
// ResidentPartition
// ---------------------------------------------------------------------------

/// The one day currently held in memory.
#[derive(Debug)]
struct ResidentPartition {
    key: PartitionKey,
    path: PathBuf,
    rows: Vec<Row>,
    /// Header read from disk, used when no columns are declared.
    header: Vec<String>,
    dirty: bool,
}

impl ResidentPartition {
    fn width(&self) -> Option<usize> {
        self.rows.iter().map(Row::arity).max()
    }

    /// Header to write: the declared columns, else the loaded header, else
    /// positional names; whichever matches the row width first.
    fn header_for_write(&self, declared: &[String]) -> Vec<String> {
        let width = self
            .width()
            .unwrap_or(if declared.is_empty() { self.header.len() } else { declared.len() });

        if declared.len() == width {
            declared.to_vec()
        } else if self.header.len() == width {
            self.header.clone()
        } else {
            table::positional_header(width)
        }
    }

    fn persist(&mut self, declared: &[String], durable: bool) -> Result<()> {
        let header = self.header_for_write(declared);
        table::write_day_file(&self.path, &header, &self.rows, durable)?;
        self.dirty = false;
        tracing::debug!(
            partition = %self.key,
            path = %self.path.display(),
            rows = self.rows.len(),
            "flushed partition"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PartitionedLogger
// ---------------------------------------------------------------------------

/// Appends timestamped numeric rows to per-day CSV partitions and computes
/// per-day column aggregates.
///
/// Not internally synchronized: every method that can touch the resident
/// partition takes `&mut self`. Wrap the logger in a `Mutex` to share it.
#[derive(Debug)]
pub struct PartitionedLogger {
    category: String,
    root_dir: PathBuf,
    columns: Vec<String>,
    auto_flush: bool,
    eviction: EvictionPolicy,
    durable: bool,
    resident: Option<ResidentPartition>,
}

impl PartitionedLogger {
    /// Create a logger for `category` rooted at `root_dir`.
    ///
    /// A relative root is made absolute against the current directory.
    /// Nothing is created on disk until a partition is touched. Eviction
    /// defaults to [`EvictionPolicy::Discard`].
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Io`] if the current directory is needed to
    /// resolve a relative root and cannot be read.
    pub fn new<I, S>(
        category: impl Into<String>,
        root_dir: impl AsRef<Path>,
        columns: I,
        auto_flush: bool,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_config(
            LoggerConfig::new(category, root_dir.as_ref())
                .with_columns(columns)
                .with_auto_flush(auto_flush),
        )
    }

    /// Create a logger from a [`LoggerConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(config: LoggerConfig) -> Result<Self> {
        let root_dir = std::path::absolute(&config.root_dir)
            .map_err(|e| LoggerError::io(IoOp::Read, &config.root_dir, e))?;

        Ok(Self {
            category: config.category,
            root_dir,
            columns: config.columns,
            auto_flush: config.auto_flush,
            eviction: config.eviction,
            durable: config.durable,
            resident: None,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Category name used as the partition filename prefix.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Absolute root of the `YYYY/MM` tree.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Declared column order for [`append_row_by_fields`](Self::append_row_by_fields).
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub const fn auto_flush(&self) -> bool {
        self.auto_flush
    }

    #[must_use]
    pub const fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Whether the resident partition has rows not yet written to disk.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.resident.as_ref().is_some_and(|r| r.dirty)
    }

    /// Day currently held in memory, if any.
    #[must_use]
    pub fn resident_key(&self) -> Option<PartitionKey> {
        self.resident.as_ref().map(|r| r.key)
    }

    /// File backing the resident day, if any.
    #[must_use]
    pub fn resident_path(&self) -> Option<&Path> {
        self.resident.as_ref().map(|r| r.path.as_path())
    }

    /// Rows of the resident day in insertion order.
    #[must_use]
    pub fn resident_rows(&self) -> &[Row] {
        self.resident
            .as_ref()
            .map(|r| r.rows.as_slice())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Path of the partition file for `timestamp`'s day:
    /// `<root>/<YYYY>/<MM>/<category>_<YYYY>_<MM>_<DD>.csv`.
    ///
    /// Creates the `<YYYY>/<MM>` directory on every call (idempotent). The
    /// file itself may or may not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Io`] if the directory cannot be created.
    pub fn partition_path(&self, timestamp: NaiveDateTime) -> Result<PathBuf> {
        self.prepare_partition(PartitionKey::of(&timestamp))
    }

    fn prepare_partition(&self, key: PartitionKey) -> Result<PathBuf> {
        let dir = partition::partition_dir(&self.root_dir, key);
        fs::create_dir_all(&dir).map_err(|e| LoggerError::io(IoOp::CreateDir, &dir, e))?;
        Ok(partition::partition_file(&self.root_dir, &self.category, key))
    }

    /// Days with a partition file for this category, oldest first.
    ///
    /// Only files on disk are listed; unflushed resident rows are not.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Io`] if a directory under the root cannot be
    /// read.
    pub fn list_partitions(&self) -> Result<Vec<PartitionKey>> {
        partition::list_partitions(&self.root_dir, &self.category)
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Make `key`'s day resident, evicting the current one if it is a
    /// different day.
    fn ensure_loaded(&mut self, key: PartitionKey) -> Result<&mut ResidentPartition> {
        let resident = match self.resident.take() {
            Some(resident) if resident.key == key => resident,
            other => {
                self.resident = other;
                self.evict()?;
                self.load(key)?
            }
        };
        Ok(self.resident.insert(resident))
    }

    fn load(&self, key: PartitionKey) -> Result<ResidentPartition> {
        let path = self.prepare_partition(key)?;
        let DayTable { header, rows } = if path.exists() {
            let table = table::read_day_file(&path)?;
            tracing::debug!(
                partition = %key,
                path = %path.display(),
                rows = table.rows.len(),
                "loaded partition"
            );
            table
        } else {
            DayTable::default()
        };

        Ok(ResidentPartition {
            key,
            path,
            rows,
            header,
            dirty: false,
        })
    }

    /// Drop the resident day, applying the eviction policy to unflushed rows.
    ///
    /// If a flush-first write fails the day stays resident and dirty.
    fn evict(&mut self) -> Result<()> {
        let Some(mut prev) = self.resident.take() else {
            return Ok(());
        };
        if !prev.dirty {
            return Ok(());
        }

        match self.eviction {
            EvictionPolicy::FlushFirst => {
                if let Err(e) = prev.persist(&self.columns, self.durable) {
                    tracing::warn!(
                        partition = %prev.key,
                        code = %e.code(),
                        "{}; keeping partition resident",
                        e.code().message()
                    );
                    self.resident = Some(prev);
                    return Err(e);
                }
            }
            EvictionPolicy::Discard => {
                tracing::warn!(
                    partition = %prev.key,
                    rows = prev.rows.len(),
                    "discarding unflushed rows on partition switch"
                );
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    /// Rewrite the resident day's file from memory.
    ///
    /// No-op if no day is resident or nothing changed since the last flush.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Io`] if the write fails. The partition stays
    /// dirty in that case.
    pub fn flush(&mut self) -> Result<()> {
        match self.resident.as_mut() {
            Some(resident) if resident.dirty => resident.persist(&self.columns, self.durable),
            _ => Ok(()),
        }
    }

    /// Append a row to its day's partition.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::ArityMismatch`] if the row's width differs from
    /// the declared columns (or, with none declared, from the partition's
    /// first row), and any load or flush error.
    pub fn append(&mut self, row: Row) -> Result<()> {
        let declared = self.columns.len();
        let resident = self.ensure_loaded(row.partition_key())?;

        let expected = if declared > 0 {
            Some(declared)
        } else {
            resident.rows.first().map(Row::arity)
        };
        if let Some(expected) = expected {
            if row.arity() != expected {
                return Err(LoggerError::ArityMismatch {
                    expected,
                    actual: row.arity(),
                });
            }
        }

        resident.rows.push(row);
        resident.dirty = true;

        if self.auto_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Append `values` (in column order) at `timestamp`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_row(&mut self, timestamp: NaiveDateTime, values: Vec<f64>) -> Result<()> {
        self.append(Row::new(timestamp, values))
    }

    /// Append a row given as a column-name map, ordered by the declared
    /// columns. Keys that are not declared columns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::MissingField`] for the first declared column
    /// absent from `fields`, otherwise see [`append`](Self::append).
    pub fn append_row_by_fields<H: BuildHasher>(
        &mut self,
        timestamp: NaiveDateTime,
        fields: &HashMap<String, f64, H>,
    ) -> Result<()> {
        let values = self
            .columns
            .iter()
            .map(|column| {
                fields
                    .get(column)
                    .copied()
                    .ok_or_else(|| LoggerError::MissingField {
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;
        self.append_row(timestamp, values)
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    fn day_rows(&mut self, timestamp: NaiveDateTime) -> Result<&[Row]> {
        Ok(self.ensure_loaded(PartitionKey::of(&timestamp))?.rows.as_slice())
    }

    fn aggregate(
        &mut self,
        timestamp: NaiveDateTime,
        f: fn(&[Row]) -> Vec<f64>,
    ) -> Result<Option<Vec<f64>>> {
        let rows = self.day_rows(timestamp)?;
        Ok((!rows.is_empty()).then(|| f(rows)))
    }

    /// Column-wise minimum over `timestamp`'s day, or `None` if the day has
    /// no rows on disk or in memory.
    ///
    /// # Errors
    ///
    /// Any error from loading the day.
    pub fn daily_min(&mut self, timestamp: NaiveDateTime) -> Result<Option<Vec<f64>>> {
        self.aggregate(timestamp, stats::column_min)
    }

    /// Column-wise maximum; see [`daily_min`](Self::daily_min).
    ///
    /// # Errors
    ///
    /// Any error from loading the day.
    pub fn daily_max(&mut self, timestamp: NaiveDateTime) -> Result<Option<Vec<f64>>> {
        self.aggregate(timestamp, stats::column_max)
    }

    /// Column-wise arithmetic mean; see [`daily_min`](Self::daily_min).
    ///
    /// # Errors
    ///
    /// Any error from loading the day.
    pub fn daily_mean(&mut self, timestamp: NaiveDateTime) -> Result<Option<Vec<f64>>> {
        self.aggregate(timestamp, stats::column_mean)
    }

    /// Min, max, mean and row count of `timestamp`'s day in one pass.
    ///
    /// # Errors
    ///
    /// Any error from loading the day.
    pub fn daily_summary(&mut self, timestamp: NaiveDateTime) -> Result<Option<DailySummary>> {
        let rows = self.day_rows(timestamp)?;
        Ok((!rows.is_empty()).then(|| stats::summarize(rows)))
    }
}

impl Drop for PartitionedLogger {
    fn drop(&mut self) {
        if let Some(resident) = &self.resident {
            if resident.dirty {
                tracing::warn!(
                    partition = %resident.key,
                    rows = resident.rows.len(),
                    "logger dropped with unflushed rows"
                );
            }
        }
    }
}
