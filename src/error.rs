use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::DataType;

/// Convenience result type for pipeline operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Fatal error returned by the conversion pipeline.
///
/// Value-level and row-level problems never surface here; they are recovered locally and
/// itemised in the [`crate::report::ConversionReport`].
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The delimiter could not be inferred from the sampled prefix.
    #[error("format detection failed for {}: {reason}", path.display())]
    FormatDetection {
        path: PathBuf,
        #[source]
        reason: DetectionFailure,
    },

    /// The source could not be read into a table.
    #[error("ingest failed for {}: {reason}", path.display())]
    Ingest {
        path: PathBuf,
        #[source]
        reason: IngestFailure,
    },

    /// The output location could not be prepared or written.
    #[error("write failed for {}: {reason}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        reason: WriteFailure,
    },

    /// Options are invalid (zero sizes, unknown compression, unreadable config file, ...).
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl ConvertError {
    /// Terminal status a caller should report for this error.
    pub fn status(&self) -> RunStatus {
        match self {
            ConvertError::FormatDetection { .. } => RunStatus::FormatDetectionError,
            ConvertError::Ingest { .. } | ConvertError::Config { .. } => RunStatus::IngestError,
            ConvertError::Write { .. } => RunStatus::WriteError,
        }
    }
}

/// Why delimiter detection failed.
#[derive(Debug, Error)]
pub enum DetectionFailure {
    /// The source has fewer lines than the requested sample.
    #[error("source too short: requested {requested} sample lines, found {found}")]
    TooShort { requested: usize, found: usize },

    /// No candidate delimiter appears consistently across the sample.
    #[error("no consistent delimiter across {lines} sampled lines")]
    NoConsistentDelimiter { lines: usize },
}

/// Why reading the source failed.
#[derive(Debug, Error)]
pub enum IngestFailure {
    /// Underlying I/O error (file not found, permission denied, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error that could not be recovered by skipping a record.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The delimiter splits the header into a single column.
    #[error("delimiter {delimiter:?} yields no usable columns (header has {columns} column)")]
    NoUsableColumns { delimiter: char, columns: usize },

    /// The header does not contain every schema column.
    #[error("schema mismatch: missing required column(s) {missing:?}. headers={headers:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        headers: Vec<String>,
    },

    /// Every data record was skipped or the source has no data records.
    #[error("no usable rows after parsing ({skipped} malformed records skipped)")]
    NoUsableRows { skipped: usize },
}

/// Why the output location could not be written.
#[derive(Debug, Error)]
pub enum WriteFailure {
    /// Underlying I/O error (cannot create directory or file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Parquet serialization error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A cell does not hold its column's type; the partition is not written.
    #[error("column {column} row {row}: expected {expected}, found {found}")]
    ValueMismatch {
        column: String,
        row: usize,
        expected: DataType,
        found: &'static str,
    },
}

/// Overall outcome of a run, mapped to a process exit code by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Every partition was written.
    Ok,
    /// Sniffing failed; nothing was written.
    FormatDetectionError,
    /// The source could not be ingested; nothing was written.
    IngestError,
    /// At least one partition failed to write.
    WriteError,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::FormatDetectionError => 2,
            RunStatus::IngestError => 3,
            RunStatus::WriteError => 4,
        }
    }

    /// Whether the run succeeded.
    pub fn is_ok(self) -> bool {
        self == RunStatus::Ok
    }
}
