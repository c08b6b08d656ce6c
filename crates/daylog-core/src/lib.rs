//! daylog-core: day-partitioned CSV measurement logging.
//!
//! Rows of numeric measurements are appended to one CSV file per category
//! per day (`<root>/<YYYY>/<MM>/<category>_<YYYY>_<MM>_<DD>.csv`), and
//! per-day column minimum, maximum and mean are computed on demand.
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use daylog_core::PartitionedLogger;
//!
//! let mut logger = PartitionedLogger::new("meter", "/var/lib/meter", ["A", "B", "C"], true)?;
//! let ts = NaiveDate::from_ymd_opt(2015, 1, 2)
//!     .and_then(|d| d.and_hms_opt(3, 4, 5))
//!     .expect("valid timestamp");
//! logger.append_row(ts, vec![1.0, 2.0, 3.0])?;
//! assert_eq!(logger.daily_mean(ts)?, Some(vec![1.0, 2.0, 3.0]));
//! # Ok::<(), daylog_core::LoggerError>(())
//! ```
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`Result`] with a typed
//!   [`LoggerError`]; config loading uses `anyhow::Result`.
//! - **Logging**: `tracing` macros only; no subscriber is installed here.

pub mod config;
pub mod error;
pub mod logger;
pub mod partition;
pub mod row;
pub mod stats;
pub mod table;

pub use config::{EvictionPolicy, LoggerConfig};
pub use error::{ErrorCode, IoOp, LoggerError, Result};
pub use logger::PartitionedLogger;
pub use partition::PartitionKey;
pub use row::Row;
pub use stats::DailySummary;
