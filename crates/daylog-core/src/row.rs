use chrono::NaiveDateTime;

use crate::partition::PartitionKey;

/// One logged measurement row: a timestamp and its column values in
/// column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp: NaiveDateTime,
    pub values: Vec<f64>,
}

impl Row {
    #[must_use]
    pub const fn new(timestamp: NaiveDateTime, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    /// Number of value columns (the `DateTime` index is not counted).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// The day partition this row belongs to.
    #[must_use]
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::of(&self.timestamp)
    }
}
