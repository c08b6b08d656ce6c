//! Column-wise aggregates over resident rows.
//!
//! Missing values (NaN, written as empty cells) are skipped. A column with no
//! present values aggregates to NaN. Rows narrower than the widest row are
//! treated as missing in the columns they lack.

use crate::row::Row;

/// Min, max and mean of every column of one day, plus the row count.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub rows: usize,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub mean: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct ColumnAcc {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl ColumnAcc {
    const EMPTY: Self = Self {
        count: 0,
        sum: 0.0,
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn min(self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.min }
    }

    fn max(self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.max }
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

fn accumulate(rows: &[Row]) -> Vec<ColumnAcc> {
    let width = rows.iter().map(Row::arity).max().unwrap_or(0);
    let mut accs = vec![ColumnAcc::EMPTY; width];
    for row in rows {
        for (acc, &value) in accs.iter_mut().zip(&row.values) {
            acc.push(value);
        }
    }
    accs
}

/// Column-wise minimum.
#[must_use]
pub fn column_min(rows: &[Row]) -> Vec<f64> {
    accumulate(rows).into_iter().map(ColumnAcc::min).collect()
}

/// Column-wise maximum.
#[must_use]
pub fn column_max(rows: &[Row]) -> Vec<f64> {
    accumulate(rows).into_iter().map(ColumnAcc::max).collect()
}

/// Column-wise arithmetic mean.
#[must_use]
pub fn column_mean(rows: &[Row]) -> Vec<f64> {
    accumulate(rows).into_iter().map(ColumnAcc::mean).collect()
}

/// All three aggregates in a single pass.
#[must_use]
pub fn summarize(rows: &[Row]) -> DailySummary {
    let accs = accumulate(rows);
    DailySummary {
        rows: rows.len(),
        min: accs.iter().map(|a| a.min()).collect(),
        max: accs.iter().map(|a| a.max()).collect(),
        mean: accs.iter().map(|a| a.mean()).collect(),
    }
}
