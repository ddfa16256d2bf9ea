//! Post-write structural validation of emitted parquet files.
//!
//! Validation only reads and never fails. A file that fails to open or decode is reported as
//! invalid and has no effect on any other file; a directory that cannot be listed is recorded in
//! [`ValidationReport::listing_error`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use parquet::basic::Type as PhysicalType;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use serde::Serialize;
use walkdir::WalkDir;

use crate::execution::{ExecutionEngine, PartitionTask};
use crate::types::{DataType, Schema};

use super::partition_index;

/// One column as stored in a parquet file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Parquet physical type, e.g. `BYTE_ARRAY` or `DOUBLE`.
    pub physical_type: String,
    /// Logical type this crate maps the column to, if it recognises it.
    pub data_type: Option<DataType>,
}

/// Result of reopening one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// The file decoded completely and matches the expected schema.
    Valid { rows: u64, columns: Vec<ColumnSchema> },
    /// The file could not be reopened, decoded, or does not match the expected schema.
    Invalid { error: String },
}

/// Validation outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileValidation {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileValidation {
    /// Whether the file is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self.status, FileStatus::Valid { .. })
    }

    /// Decoded row count of a valid file.
    pub fn rows(&self) -> Option<u64> {
        match &self.status {
            FileStatus::Valid { rows, .. } => Some(*rows),
            FileStatus::Invalid { .. } => None,
        }
    }
}

/// Outcome of [`validate_output`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// One entry per `*.parquet` file, in partition order.
    pub files: Vec<FileValidation>,
    /// Set when the directory itself could not be listed; `files` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
}

impl ValidationReport {
    /// Whether the directory was listed and every file in it is valid.
    pub fn all_valid(&self) -> bool {
        self.listing_error.is_none() && self.files.iter().all(FileValidation::is_valid)
    }

    /// Rows across valid files.
    pub fn total_rows(&self) -> u64 {
        self.files.iter().filter_map(FileValidation::rows).sum()
    }

    /// Files that failed validation.
    pub fn invalid_files(&self) -> impl Iterator<Item = &FileValidation> {
        self.files.iter().filter(|f| !f.is_valid())
    }
}

struct ValidateTask<'s> {
    expected: &'s Schema,
}

impl PartitionTask for ValidateTask<'_> {
    type Input = PathBuf;
    type Output = FileValidation;

    fn name(&self) -> &'static str {
        "validate"
    }

    fn run(&self, path: PathBuf) -> FileValidation {
        let status = match check_file(&path, self.expected) {
            Ok((rows, columns)) => FileStatus::Valid { rows, columns },
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "output file failed validation");
                FileStatus::Invalid { error }
            }
        };
        FileValidation { path, status }
    }
}

fn check_file(path: &Path, expected: &Schema) -> Result<(u64, Vec<ColumnSchema>), String> {
    let reader = SerializedFileReader::try_from(path).map_err(|e| format!("cannot open: {e}"))?;

    let metadata_rows = reader.metadata().file_metadata().num_rows();
    let columns: Vec<ColumnSchema> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| {
            let physical = c.physical_type();
            ColumnSchema {
                name: c.path().string(),
                physical_type: format!("{physical:?}"),
                data_type: match physical {
                    PhysicalType::BYTE_ARRAY => Some(DataType::Utf8),
                    PhysicalType::DOUBLE => Some(DataType::Float64),
                    _ => None,
                },
            }
        })
        .collect();

    let actual: Vec<(&str, Option<DataType>)> =
        columns.iter().map(|c| (c.name.as_str(), c.data_type)).collect();
    let wanted: Vec<(&str, Option<DataType>)> = expected
        .fields
        .iter()
        .map(|f| (f.name.as_str(), Some(f.data_type)))
        .collect();
    if actual != wanted {
        return Err(format!("schema mismatch: expected {wanted:?}, found {actual:?}"));
    }

    let mut rows: u64 = 0;
    for (idx0, row) in reader.into_iter().enumerate() {
        row.map_err(|e| format!("row {} failed to decode: {e}", idx0 + 1))?;
        rows += 1;
    }
    if i64::try_from(rows).ok() != Some(metadata_rows) {
        return Err(format!(
            "decoded {rows} rows but metadata declares {metadata_rows}"
        ));
    }

    Ok((rows, columns))
}

/// Paths of all `*.parquet` files directly inside `directory`.
///
/// `part.N.parquet` files come first in numeric partition order, then any other parquet files
/// by name.
pub fn list_parquet_files(directory: impl AsRef<Path>) -> walkdir::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory.as_ref()).min_depth(1).max_depth(1) {
        let entry = entry?;
        let is_parquet = entry.path().extension().and_then(|e| e.to_str()) == Some("parquet");
        if entry.file_type().is_file() && is_parquet {
            files.push(entry.into_path());
        }
    }
    files.sort_by(|a, b| listing_order(a).cmp(&listing_order(b)));
    Ok(files)
}

fn listing_order(path: &Path) -> (bool, usize, Option<&OsStr>) {
    let name = path.file_name();
    let index = name.and_then(OsStr::to_str).and_then(partition_index);
    (index.is_none(), index.unwrap_or(0), name)
}

/// Reopen every parquet file in `directory` and report its row count and schema.
pub fn validate_output(
    directory: impl AsRef<Path>,
    expected: &Schema,
    engine: &ExecutionEngine,
) -> ValidationReport {
    let directory = directory.as_ref();
    match list_parquet_files(directory) {
        Ok(files) => ValidationReport {
            files: engine.run_tasks(&ValidateTask { expected }, files),
            listing_error: None,
        },
        Err(e) => {
            tracing::warn!(directory = %directory.display(), error = %e, "output directory could not be listed");
            ValidationReport {
                files: Vec::new(),
                listing_error: Some(format!("cannot list {}: {e}", directory.display())),
            }
        }
    }
}
