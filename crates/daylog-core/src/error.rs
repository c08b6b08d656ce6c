use std::fmt;
use std::io;
use std::path::PathBuf;

/// Machine-readable error codes for callers that branch on failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingField,
    ArityMismatch,
    PartitionReadFailed,
    PartitionParseFailed,
    PartitionWriteFailed,
    PartitionDirFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingField => "E2001",
            Self::ArityMismatch => "E2002",
            Self::PartitionReadFailed => "E3001",
            Self::PartitionParseFailed => "E3002",
            Self::PartitionWriteFailed => "E5001",
            Self::PartitionDirFailed => "E5002",
        }
    }

    /// Short human-facing summary for logs.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingField => "Named row is missing a declared column",
            Self::ArityMismatch => "Row has the wrong number of values",
            Self::PartitionReadFailed => "Partition file read failed",
            Self::PartitionParseFailed => "Partition file is malformed",
            Self::PartitionWriteFailed => "Partition file write failed",
            Self::PartitionDirFailed => "Partition directory could not be created",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingField => Some("Supply a value for every declared column."),
            Self::ArityMismatch => {
                Some("Pass one value per declared column, in declared order.")
            }
            Self::PartitionReadFailed => Some("Check that the root directory is readable."),
            Self::PartitionParseFailed => {
                Some("Repair or move the partition file; the logger will not overwrite it.")
            }
            Self::PartitionWriteFailed => Some("Check disk space and write permissions."),
            Self::PartitionDirFailed => Some(
                "Make sure no plain file occupies the YYYY or MM path under the root directory.",
            ),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures surfaced by the logger. None are swallowed internally.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// A declared column had no entry in a named-field row.
    #[error("missing value for column '{column}'")]
    MissingField { column: String },

    /// A row's value count does not match the partition's column count.
    #[error("row has {actual} values, expected {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Directory creation, file read, file write or rename failed.
    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An existing partition file could not be parsed.
    #[error(
        "parse error in {}{}: {message}",
        .path.display(),
        .line.map_or_else(String::new, |l| format!(" at line {l}"))
    )]
    Parse {
        path: PathBuf,
        line: Option<u64>,
        message: String,
    },
}

impl LoggerError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::ArityMismatch { .. } => ErrorCode::ArityMismatch,
            Self::Io { op: IoOp::Read, .. } => ErrorCode::PartitionReadFailed,
            Self::Io {
                op: IoOp::CreateDir,
                ..
            } => ErrorCode::PartitionDirFailed,
            Self::Io { .. } => ErrorCode::PartitionWriteFailed,
            Self::Parse { .. } => ErrorCode::PartitionParseFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    pub(crate) fn io(op: IoOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(
        path: impl Into<PathBuf>,
        line: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// The filesystem operation an [`LoggerError::Io`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    CreateDir,
    Read,
    Write,
    Rename,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateDir => "create directory",
            Self::Read => "read",
            Self::Write => "write",
            Self::Rename => "rename into",
        })
    }
}

pub type Result<T> = std::result::Result<T, LoggerError>;
