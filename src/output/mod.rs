//! Columnar output: partition files and their post-write validation.
//!
//! - [`write_partitions`] emits `part.<index>.parquet` per partition, no index column
//! - [`validate_output`] reopens every parquet file in the directory and reports rows and schema

pub mod validate;
pub mod writer;

pub use validate::{list_parquet_files, validate_output, ColumnSchema, FileStatus, FileValidation, ValidationReport};
pub use writer::{parquet_message_type, write_partitions, PartitionWriteFailure, WriteReport, WrittenFile};

/// File name of partition `index`.
pub fn partition_file_name(index: usize) -> String {
    format!("part.{index}.parquet")
}

/// Partition index encoded in a `part.N.parquet` file name.
pub fn partition_index(file_name: &str) -> Option<usize> {
    file_name.strip_prefix("part.")?.strip_suffix(".parquet")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_names_round_trip_their_index() {
        assert_eq!(partition_file_name(12), "part.12.parquet");
        assert_eq!(partition_index("part.12.parquet"), Some(12));
        assert_eq!(partition_index("part.x.parquet"), None);
        assert_eq!(partition_index("summary.parquet"), None);
    }
}
